//! HTTP request handlers for the static map API.
//!
//! # Endpoints
//!
//! - `GET /map.png?center=..&zoom=..&size=..` - Render a map from query parameters
//! - `POST /map.png` - Render a map from a JSON body
//! - `GET /health`, `GET /status` - Health check

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{CachedImage, RenderCache};
use crate::error::MapError;
use crate::render::RenderEngine;
use crate::request::{MapEnvelope, MapRequest, RequestParser};

/// Response header reporting whether the map came from the store.
pub const CACHE_HIT_HEADER: &str = "x-map-cache-hit";

/// Response header carrying the tile attribution notice.
pub const ATTRIBUTION_HEADER: &str = "x-map-attribution";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to handlers via Axum's State extractor.
pub struct AppState<E: RenderEngine> {
    /// Lookup-or-render cache in front of the engine
    pub cache: Arc<RenderCache<E>>,

    /// Query parser carrying the configured size bounds
    pub parser: RequestParser,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Attribution notice sent unless a request disables it
    pub attribution: Option<HeaderValue>,
}

impl<E: RenderEngine> AppState<E> {
    /// Create application state with the default max-age and no attribution.
    pub fn new(cache: RenderCache<E>, parser: RequestParser) -> Self {
        Self {
            cache: Arc::new(cache),
            parser,
            cache_max_age: 86400,
            attribution: None,
        }
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    /// Set the attribution notice.
    ///
    /// Notices that are not valid header values are dropped with a warning.
    pub fn with_attribution(mut self, attribution: &str) -> Self {
        self.attribution = match HeaderValue::from_bytes(attribution.as_bytes()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(attribution, "Attribution is not a valid header value, omitting it");
                None
            }
        };
        self
    }
}

impl<E: RenderEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            parser: self.parser,
            cache_max_age: self.cache_max_age,
            attribution: self.attribution.clone(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier ("invalid_input" or "render_failed")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Client errors are logged at WARN, render failures at ERROR.
impl IntoResponse for MapError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            MapError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            MapError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_failed"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Render a map described by URL query parameters.
///
/// # Endpoint
///
/// `GET /map.png?center=52.52,13.405&zoom=12&size=600x300`
///
/// # Query Parameters
///
/// - `center`: `lat,lon` (required)
/// - `zoom`: zoom level (required)
/// - `size`: `WIDTHxHEIGHT` (required)
/// - `markers`: `size:mid|color:blue|lat,lon|...`, repeatable
/// - `overlays`: tile URL with `{0}`, `{1}`, `{2}` placeholders, repeatable
/// - `no-attribution`: `true` to omit the attribution notice
pub async fn map_get_handler<E: RenderEngine + 'static>(
    State(state): State<AppState<E>>,
    RawQuery(query): RawQuery,
) -> Result<Response, MapError> {
    let request = state.parser.from_query(query.as_deref().unwrap_or_default())?;
    serve_map(&state, &request).await
}

/// Render a map described by a JSON body.
///
/// # Endpoint
///
/// `POST /map.png`
///
/// ```json
/// {
///   "center": {"lat": 52.52, "lon": 13.405},
///   "zoom": 12,
///   "width": 600,
///   "height": 300,
///   "markers": [{"size": "mid", "color": "blue", "coord": {"lat": 52.52, "lon": 13.405}}]
/// }
/// ```
pub async fn map_post_handler<E: RenderEngine + 'static>(
    State(state): State<AppState<E>>,
    body: Bytes,
) -> Result<Response, MapError> {
    let request = MapEnvelope::from_slice(&body)?.into_request(state.parser.bounds())?;
    serve_map(&state, &request).await
}

async fn serve_map<E: RenderEngine + 'static>(
    state: &AppState<E>,
    request: &MapRequest,
) -> Result<Response, MapError> {
    let image = state.cache.fetch(request).await?;
    debug!(
        bytes = image.data.len(),
        cache_hit = image.cache_hit,
        "Serving map"
    );

    let attribution = if request.disable_attribution() {
        None
    } else {
        state.attribution.clone()
    };

    Ok(map_response(image, state.cache_max_age, attribution))
}

fn map_response(
    image: CachedImage,
    cache_max_age: u32,
    attribution: Option<HeaderValue>,
) -> Response {
    let mut extra = HeaderMap::new();
    if let Some(attribution) = attribution {
        extra.insert(ATTRIBUTION_HEADER, attribution);
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.content_type.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", cache_max_age),
            ),
            (
                HeaderName::from_static(CACHE_HIT_HEADER),
                image.cache_hit.to_string(),
            ),
        ],
        extra,
        Body::from(image.data),
    )
        .into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health` (also served at `GET /status`)
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
