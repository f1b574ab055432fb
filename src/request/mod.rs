//! Request normalization.
//!
//! Turns untrusted client input into a [`MapRequest`]: a canonical, fully
//! validated value that the cache key is derived from and the render engine
//! consumes.
//!
//! ```text
//! query string ──► RequestParser::from_query ──┐
//!                                              ├──► MapRequest
//! JSON body ─────► MapEnvelope::into_request ──┘
//! ```
//!
//! # Example
//!
//! ```
//! use staticmap::request::{RequestParser, SizeBounds};
//!
//! let parser = RequestParser::new(SizeBounds::new(1024, 1024));
//! let request = parser
//!     .from_query("center=52.5,13.4&zoom=12&size=600x300&markers=color:blue%7C52.5,13.4")
//!     .unwrap();
//!
//! assert_eq!(request.markers().len(), 1);
//! ```

mod envelope;
mod model;
mod parser;

pub use envelope::{EnvelopeMarker, EnvelopePoint, EnvelopeSize, MapEnvelope};
pub use model::{
    MapRequest, Marker, MarkerSize, OverlaySpec, Point, Rgba, SizeBounds, MARKER_PALETTE,
    MAX_ZOOM, OVERLAY_TILE_SIZE,
};
pub use parser::{
    parse_markers, parse_overlays, parse_point, parse_size, parse_zoom, MarkerState,
    RequestParser, DEFAULT_MARKER_COLOR,
};
