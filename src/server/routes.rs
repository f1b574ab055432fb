//! Router configuration for staticmap.
//!
//! # Route Structure
//!
//! ```text
//! /health          - Health check
//! /status          - Health check (alias)
//! GET  /map.png    - Render from query parameters
//! POST /map.png    - Render from a JSON body
//! ```
//!
//! # Example
//!
//! ```ignore
//! use staticmap::cache::{CacheConfig, RenderCache};
//! use staticmap::request::{RequestParser, SizeBounds};
//! use staticmap::server::{create_router, RouterConfig};
//!
//! let cache = RenderCache::new(engine, CacheConfig::new("cache", ttl));
//! let parser = RequestParser::new(SizeBounds::new(1024, 1024));
//!
//! let config = RouterConfig::new()
//!     .with_attribution("© OpenStreetMap contributors")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(cache, parser, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, map_get_handler, map_post_handler, AppState};
use crate::cache::RenderCache;
use crate::render::RenderEngine;
use crate::request::RequestParser;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Attribution notice reported with each map
    pub attribution: Option<String>,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 day (86400 seconds)
    /// - Tracing is enabled
    /// - No attribution header is sent
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 86400,
            enable_tracing: true,
            attribution: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Report `attribution` with every map that does not opt out.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `cache` - Render cache in front of the engine
/// * `parser` - Query parser carrying the size bounds
/// * `config` - Router configuration
pub fn create_router<E>(
    cache: RenderCache<E>,
    parser: RequestParser,
    config: RouterConfig,
) -> Router
where
    E: RenderEngine + 'static,
{
    let mut app_state = AppState::new(cache, parser).with_cache_max_age(config.cache_max_age);
    if let Some(ref attribution) = config.attribution {
        app_state = app_state.with_attribution(attribution);
    }

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(health_handler))
        .route(
            "/map.png",
            get(map_get_handler::<E>).post(map_post_handler::<E>),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
