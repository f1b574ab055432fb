//! Configuration management for staticmap.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks using the `STATICMAP_` prefix:
//!
//! - `STATICMAP_HOST` - Server bind address (default: 0.0.0.0)
//! - `STATICMAP_PORT` - Server port (default: 3000)
//! - `STATICMAP_CACHE_DIR` - Directory for rendered maps (default: cache)
//! - `STATICMAP_FORCE_CACHE` - How long a rendered map stays fresh (default: 24h, 0 disables)
//! - `STATICMAP_MAX_SIZE` - Largest map requestable (default: 1024x1024, 0x0 = unbounded)
//! - `STATICMAP_TILE_URL` - Base layer URL template with `{z}`, `{x}`, `{y}`
//! - `STATICMAP_TILE_SIZE` - Base layer tile size in pixels (default: 256)
//! - `STATICMAP_ATTRIBUTION` - Attribution notice sent with every map
//! - `STATICMAP_USER_AGENT` - User-Agent for tile requests
//! - `STATICMAP_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `STATICMAP_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use staticmap::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Caching maps in {} for {:?}", config.cache_dir.display(), config.cache_ttl()?);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;
use crate::render::{TileSource, DEFAULT_TILE_SIZE, DEFAULT_TILE_URL};
use crate::request::{parse_size, SizeBounds};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default cache directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Default freshness window for rendered maps.
pub const DEFAULT_FORCE_CACHE: &str = "24h";

/// Default maximum map size.
pub const DEFAULT_MAX_SIZE: &str = "1024x1024";

/// Default attribution notice for the default base layer.
pub const DEFAULT_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Default HTTP cache max-age in seconds (1 day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86400;

// =============================================================================
// CLI Arguments
// =============================================================================

/// staticmap - render static map images from slippy-map tiles.
///
/// Serves PNG maps for a center, zoom, size and optional markers and
/// overlays. Rendered maps are cached on disk by request digest.
#[derive(Parser, Debug, Clone)]
#[command(name = "staticmap")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "STATICMAP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "STATICMAP_PORT")]
    pub port: u16,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Directory to save the cached images to.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "STATICMAP_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Force maps to be cached for this duration (e.g. 30m, 24h, 7d).
    ///
    /// Use 0 to disable the cache; every request is then rendered.
    #[arg(long, default_value = DEFAULT_FORCE_CACHE, env = "STATICMAP_FORCE_CACHE")]
    pub force_cache: String,

    /// Maximum map size requestable (WIDTHxHEIGHT, 0x0 for no limit).
    #[arg(long, default_value = DEFAULT_MAX_SIZE, env = "STATICMAP_MAX_SIZE")]
    pub max_size: String,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Base layer URL template with {z}, {x} and {y} placeholders.
    #[arg(long, default_value = DEFAULT_TILE_URL, env = "STATICMAP_TILE_URL")]
    pub tile_url: String,

    /// Base layer tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "STATICMAP_TILE_SIZE")]
    pub tile_size: u32,

    /// Attribution notice for the base layer.
    #[arg(long, default_value = DEFAULT_ATTRIBUTION, env = "STATICMAP_ATTRIBUTION")]
    pub attribution: String,

    /// User-Agent sent to tile servers (defaults to staticmap/<version>).
    #[arg(long, env = "STATICMAP_USER_AGENT")]
    pub user_agent: Option<String>,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "STATICMAP_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "STATICMAP_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.cache_ttl()?;
        self.size_bounds()?;

        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.tile_url.contains(placeholder) {
                return Err(format!("tile_url must contain {}", placeholder));
            }
        }

        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed `force_cache` duration.
    pub fn cache_ttl(&self) -> Result<Duration, String> {
        parse_duration(&self.force_cache).map_err(|e| format!("force_cache: {}", e))
    }

    /// Parsed `max_size` bounds.
    pub fn size_bounds(&self) -> Result<SizeBounds, String> {
        let (max_width, max_height) = parse_size(&self.max_size, SizeBounds::unbounded())
            .map_err(|e| format!("max_size: {}", e))?;
        Ok(SizeBounds::new(max_width, max_height))
    }

    /// Render cache settings (call validate() first).
    pub fn cache_config(&self) -> Result<CacheConfig, String> {
        Ok(CacheConfig::new(self.cache_dir.clone(), self.cache_ttl()?))
    }

    /// Base tile layer.
    pub fn tile_source(&self) -> TileSource {
        TileSource::new(self.tile_url.clone(), self.tile_size)
    }

    /// User-Agent for tile requests.
    pub fn user_agent_or_default(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("staticmap/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Parse `<n>`, `<n>s`, `<n>m`, `<n>h` or `<n>d` into a duration.
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?}", s))?;

    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("unknown duration unit {:?} in {:?}", unit, s)),
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration {:?} is too large", s))
}

// =============================================================================
// Tests
// =============================================================================
