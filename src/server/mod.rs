//! HTTP server layer for staticmap.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            GET /map.png?...        POST /map.png                │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌──────────────────────────────┐ │
//! │  │        handlers          │  │            routes            │ │
//! │  │ (parse, fetch, headers)  │  │  (router, CORS, tracing)     │ │
//! │  └──────────────────────────┘  └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                    RenderCache ──► RenderEngine
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, map_get_handler, map_post_handler, AppState, ErrorResponse, HealthResponse,
    ATTRIBUTION_HEADER, CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
