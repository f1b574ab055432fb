//! Filesystem-backed render cache.
//!
//! # Lookup
//!
//! ```text
//! get(key, request)
//!   │
//!   ├─ ttl == 0 ─────────────────────────────┐
//!   ├─ stat {dir}/{shard}/{key}.png          │
//!   │    fresh (mtime + ttl > now) ──► read ──┼─► HIT
//!   │    missing / stale / unreadable ────────┤
//!   │                                        ▼
//!   └──────────────────────────────► render (one per key in flight)
//!                                           │
//!                                  temp file in shard dir
//!                                           │
//!                                  rename into place ──► MISS
//! ```
//!
//! Rendering and persisting run in a spawned task, so a client that goes
//! away mid-request does not abort work later lookups will reuse. Write
//! errors are logged and swallowed: the freshly rendered bytes are returned
//! either way.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::error::{CacheError, MapError, RenderError};
use crate::render::RenderEngine;
use crate::request::MapRequest;

use super::key::{CacheKey, CACHE_VERSION};

/// File extension of stored images.
pub const IMAGE_EXTENSION: &str = "png";

/// Content type of stored images.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Default freshness window: 24 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Where and for how long rendered maps are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root of the sharded store
    pub cache_dir: PathBuf,

    /// Freshness window; zero disables caching entirely
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
        }
    }

    /// Whether lookups can ever hit.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }
}

// =============================================================================
// Result
// =============================================================================

/// A rendered map, from the store or freshly rendered.
#[derive(Debug, Clone)]
pub struct CachedImage {
    /// Encoded image bytes
    pub data: Bytes,

    /// MIME type of `data`
    pub content_type: &'static str,

    /// Whether `data` came from the store
    pub cache_hit: bool,
}

// =============================================================================
// Render Cache
// =============================================================================

type InFlight = Arc<OnceCell<Result<Bytes, RenderError>>>;

/// Lookup-or-render cache over a sharded directory tree.
///
/// # Example
///
/// ```ignore
/// use staticmap::cache::{CacheConfig, RenderCache, DEFAULT_CACHE_TTL};
/// use staticmap::render::TileMapRenderer;
///
/// let engine = TileMapRenderer::new(source, "staticmap/0.1")?;
/// let cache = RenderCache::new(engine, CacheConfig::new("cache", DEFAULT_CACHE_TTL));
///
/// let image = cache.fetch(&request).await?;
/// println!("{} bytes, hit: {}", image.data.len(), image.cache_hit);
/// ```
pub struct RenderCache<E: RenderEngine> {
    /// Engine invoked on misses
    engine: Arc<E>,

    /// Cache root and TTL
    config: CacheConfig,

    /// Version tag mixed into derived keys
    version: String,

    /// Renders in progress, so concurrent misses on one key render once.
    /// Entries are removed by the render task itself, so a caller that
    /// goes away mid-render cannot leave one behind.
    in_flight: Arc<Mutex<HashMap<CacheKey, InFlight>>>,
}

impl<E: RenderEngine + 'static> RenderCache<E> {
    /// Create a cache that owns its engine.
    pub fn new(engine: E, config: CacheConfig) -> Self {
        Self::with_shared_engine(Arc::new(engine), config)
    }

    /// Create a cache around an engine shared with other components.
    pub fn with_shared_engine(engine: Arc<E>, config: CacheConfig) -> Self {
        Self {
            engine,
            config,
            version: CACHE_VERSION.to_string(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the version tag used by [`RenderCache::key_for`].
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Derive the key for `request` under this cache's version tag.
    pub fn key_for(&self, request: &MapRequest) -> CacheKey {
        CacheKey::derive(request, &self.version)
    }

    /// Storage path for `key`: `{cache_dir}/{shard}/{key}.png`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.config
            .cache_dir
            .join(key.shard())
            .join(format!("{}.{}", key, IMAGE_EXTENSION))
    }

    /// Derive the key for `request` and look it up.
    pub async fn fetch(&self, request: &MapRequest) -> Result<CachedImage, MapError> {
        let key = self.key_for(request);
        self.get(&key, request).await
    }

    /// Return the stored image for `key` if fresh, otherwise render
    /// `request` and store the result.
    ///
    /// # Errors
    ///
    /// Only render failures are returned. Cache read and write failures are
    /// logged and never fail the call.
    pub async fn get(&self, key: &CacheKey, request: &MapRequest) -> Result<CachedImage, MapError> {
        let path = self.path_for(key);

        if self.config.is_enabled() {
            match read_fresh(&path, self.config.ttl).await {
                Ok(Some(data)) => {
                    debug!(key = %key, bytes = data.len(), "Render cache hit");
                    return Ok(CachedImage {
                        data,
                        content_type: PNG_CONTENT_TYPE,
                        cache_hit: true,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(key = %key, error = %e, "Cached map unreadable, rendering instead");
                }
            }
        }

        debug!(key = %key, "Render cache miss");
        let data = self.render_once(key, request, path).await?;

        Ok(CachedImage {
            data,
            content_type: PNG_CONTENT_TYPE,
            cache_hit: false,
        })
    }

    /// Render `request`, sharing the result with concurrent misses on `key`.
    async fn render_once(
        &self,
        key: &CacheKey,
        request: &MapRequest,
        path: PathBuf,
    ) -> Result<Bytes, RenderError> {
        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.entry(key.clone()).or_default().clone()
        };

        cell.get_or_init(|| self.spawn_render(key, request, path, Arc::clone(&cell)))
            .await
            .clone()
    }

    /// Render and persist on a detached task, then retire the in-flight entry.
    async fn spawn_render(
        &self,
        key: &CacheKey,
        request: &MapRequest,
        path: PathBuf,
        cell: InFlight,
    ) -> Result<Bytes, RenderError> {
        let engine = Arc::clone(&self.engine);
        let in_flight = Arc::clone(&self.in_flight);
        let request = request.clone();
        let persist = self.config.is_enabled();
        let key = key.clone();

        let task = tokio::spawn(async move {
            let result = engine.render(&request).await;

            if let (true, Ok(data)) = (persist, &result) {
                match persist_image(path, data.clone()).await {
                    Ok(()) => debug!(key = %key, bytes = data.len(), "Stored rendered map"),
                    Err(e) => warn!(key = %key, error = %e, "Failed to store rendered map"),
                }
            }

            // Later requests must see the store (or render again), not this cell
            let mut in_flight = in_flight.lock().await;
            if in_flight
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                in_flight.remove(&key);
            }

            result
        });

        task.await.map_err(|e| RenderError::Task(e.to_string()))?
    }
}

// =============================================================================
// Store I/O
// =============================================================================

/// Whether a file modified at `modified` is still within `ttl` at `now`.
fn is_fresh(modified: SystemTime, ttl: Duration, now: SystemTime) -> bool {
    modified
        .checked_add(ttl)
        .map_or(true, |expires_at| expires_at > now)
}

/// Read `path` if it exists and is fresh.
async fn read_fresh(path: &Path, ttl: Duration) -> Result<Option<Bytes>, CacheError> {
    let read_error = |e: std::io::Error| CacheError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_error(e)),
    };

    let modified = metadata.modified().map_err(read_error)?;
    if !is_fresh(modified, ttl, SystemTime::now()) {
        return Ok(None);
    }

    // The file may vanish or change between stat and read
    let data = tokio::fs::read(path).await.map_err(read_error)?;
    Ok(Some(Bytes::from(data)))
}

async fn persist_image(path: PathBuf, data: Bytes) -> Result<(), CacheError> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || write_atomic(&path, &data))
        .await
        .map_err(|e| CacheError::Write {
            path: display,
            message: e.to_string(),
        })?
}

/// Write `data` to a temp file next to `path`, then rename it into place.
///
/// Readers see either the previous file or the complete new one.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_error = |e: std::io::Error| CacheError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    std::fs::create_dir_all(dir).map_err(|e| CacheError::CreateDir {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix(".render-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;
    file.write_all(data).map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_error)?;
    }

    file.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
