//! Test utilities for integration tests.
//!
//! Provides a call-counting fake render engine, router builders backed by a
//! temporary cache directory, and helpers for building tiny PNG tiles.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use staticmap::error::RenderError;
use staticmap::render::RenderEngine;
use staticmap::{
    create_router, CacheConfig, MapRequest, RenderCache, RequestParser, RouterConfig, SizeBounds,
};

// =============================================================================
// Counting Engine
// =============================================================================

/// A fake engine that counts invocations and returns a tiny real PNG.
pub struct CountingEngine {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// An engine that sleeps before answering, to widen race windows.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// An engine whose every render fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for CountingEngine {
    async fn render(&self, request: &MapRequest) -> Result<Bytes, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(RenderError::TileFetch {
                url: "http://tiles.invalid/0/0/0.png".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(solid_png(
            request.width(),
            request.height(),
            Rgba([10, 20, 30, 255]),
        ))
    }
}

// =============================================================================
// Router Builders
// =============================================================================

/// A router wired to a counting engine and a cache under a fresh temp dir.
///
/// Keep the returned `TempDir` alive for as long as the router is used.
pub struct TestApp {
    pub dir: TempDir,
    pub engine: Arc<CountingEngine>,
    pub cache_config: CacheConfig,
}

impl TestApp {
    pub fn new(ttl: Duration) -> Self {
        Self::with_engine(CountingEngine::new(), ttl)
    }

    pub fn with_engine(engine: CountingEngine, ttl: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache_config = CacheConfig::new(dir.path(), ttl);
        Self {
            dir,
            engine: Arc::new(engine),
            cache_config,
        }
    }

    /// A render cache over this app's directory and engine.
    pub fn cache(&self) -> RenderCache<CountingEngine> {
        RenderCache::with_shared_engine(Arc::clone(&self.engine), self.cache_config.clone())
    }

    /// A router with 1024x1024 bounds and the given router config.
    pub fn router_with(&self, config: RouterConfig) -> axum::Router {
        create_router(
            self.cache(),
            RequestParser::new(SizeBounds::new(1024, 1024)),
            config.with_tracing(false),
        )
    }

    pub fn router(&self) -> axum::Router {
        self.router_with(RouterConfig::new().with_attribution(TEST_ATTRIBUTION))
    }
}

/// Attribution notice used by [`TestApp::router`].
pub const TEST_ATTRIBUTION: &str = "Tiles © Example";

// =============================================================================
// Request Helpers
// =============================================================================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Encode a single-color PNG.
pub fn solid_png(width: u32, height: u32, color: Rgba<u8>) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

/// Check if data looks like a PNG.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
}
