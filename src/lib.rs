//! # staticmap
//!
//! A static map image service with a content-addressed render cache.
//!
//! Clients describe a map (center, zoom, size, markers, tile overlays) as
//! URL query parameters or a JSON body. The request is normalized into a
//! canonical [`MapRequest`], hashed into a [`CacheKey`], and looked up in a
//! sharded on-disk store. Misses are rendered by an injected
//! [`RenderEngine`] and persisted atomically.
//!
//! ## Architecture
//!
//! - [`request`] - Parsing and validation of client input
//! - [`cache`] - Request digests and the filesystem render cache
//! - [`render`] - Render engine trait and the built-in tile renderer
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use staticmap::{
//!     create_router, CacheConfig, RenderCache, RequestParser, RouterConfig, SizeBounds,
//!     TileMapRenderer, TileSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = TileMapRenderer::new(TileSource::default(), "staticmap-example")?;
//!     let cache = RenderCache::new(
//!         engine,
//!         CacheConfig::new("cache", Duration::from_secs(24 * 60 * 60)),
//!     );
//!     let parser = RequestParser::new(SizeBounds::new(1024, 1024));
//!
//!     let router = create_router(cache, parser, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod render;
pub mod request;
pub mod server;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheKey, CachedImage, RenderCache, CACHE_VERSION};
pub use config::Config;
pub use error::{CacheError, MapError, ParseError, Placeholder, RenderError};
pub use render::{RenderEngine, TileMapRenderer, TileSource};
pub use request::{
    MapEnvelope, MapRequest, Marker, MarkerSize, OverlaySpec, Point, RequestParser, Rgba,
    SizeBounds,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
