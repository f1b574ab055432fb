//! Map rendering.
//!
//! The render cache only depends on the [`RenderEngine`] trait, so any
//! engine (or a test double) can be injected. [`TileMapRenderer`] is the
//! built-in engine: it stitches slippy-map tiles fetched over HTTP, draws
//! markers and encodes the result as PNG.

mod engine;
mod projection;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RenderError;
use crate::request::MapRequest;

pub use engine::{TileMapRenderer, TileSource, DEFAULT_TILE_SIZE, DEFAULT_TILE_URL};
pub use projection::{TileRange, Viewport};

/// Something that turns a validated request into encoded image bytes.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render `request` into an encoded PNG.
    async fn render(&self, request: &MapRequest) -> Result<Bytes, RenderError>;
}
