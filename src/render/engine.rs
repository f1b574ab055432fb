//! Built-in render engine backed by slippy-map tile servers.
//!
//! # Pipeline
//!
//! 1. Project the request center into the base layer's pixel space
//! 2. Fetch every covering tile concurrently and paste it onto the canvas
//! 3. Repeat for each overlay layer, in request order, on the same tile grid.
//!    Overlay tiles of another pixel size are rescaled to the base size.
//! 4. Draw markers in request order (later markers on top)
//! 5. Encode the canvas as PNG
//!
//! Tiles that come back `404 Not Found` are left blank (sparse overlays are
//! common); any other fetch or decode failure fails the render.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use reqwest::StatusCode;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::RenderError;
use crate::request::{MapRequest, Marker, OverlaySpec};

use super::projection::Viewport;
use super::RenderEngine;

/// Default base layer.
pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Per-tile HTTP timeout.
const TILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Canvas color where no tile covers the image.
const BACKGROUND: image::Rgba<u8> = image::Rgba([0xe0, 0xe0, 0xe0, 0xff]);

// =============================================================================
// Tile Source
// =============================================================================

/// A tile layer addressed by a `{z}`/`{x}`/`{y}` URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    pub url_template: String,
    pub tile_size: u32,
}

impl TileSource {
    pub fn new(url_template: impl Into<String>, tile_size: u32) -> Self {
        Self {
            url_template: url_template.into(),
            tile_size,
        }
    }

    pub fn tile_url(&self, zoom: u32, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

impl Default for TileSource {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_URL, DEFAULT_TILE_SIZE)
    }
}

impl From<&OverlaySpec> for TileSource {
    fn from(overlay: &OverlaySpec) -> Self {
        Self::new(overlay.url_template.clone(), overlay.tile_size)
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Renders maps by stitching tiles from a base layer and request overlays.
///
/// The attribution flag of a request is part of its cache key but is not
/// drawn: the HTTP layer reports attribution in a response header.
#[derive(Debug, Clone)]
pub struct TileMapRenderer {
    client: reqwest::Client,
    base: TileSource,
}

impl TileMapRenderer {
    /// Create a renderer that identifies itself with `user_agent` to tile servers.
    pub fn new(base: TileSource, user_agent: &str) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(TILE_TIMEOUT)
            .build()
            .map_err(|e| RenderError::Client(e.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &TileSource {
        &self.base
    }

    /// Viewport of `request` on the base layer's tile grid.
    fn viewport(&self, request: &MapRequest) -> Viewport {
        Viewport::new(
            request.center(),
            request.zoom(),
            request.width(),
            request.height(),
            self.base.tile_size,
        )
    }

    /// Paste every tile of `source` covering `viewport` onto `canvas`.
    async fn draw_layer(
        &self,
        canvas: &mut RgbaImage,
        source: &TileSource,
        viewport: &Viewport,
        zoom: u32,
    ) -> Result<(), RenderError> {
        let mut tasks = JoinSet::new();
        for (x, y) in viewport.tile_range().iter() {
            let Some((tile_x, tile_y)) = viewport.wrap_tile(x, y) else {
                continue;
            };
            let url = source.tile_url(zoom, tile_x, tile_y);
            let client = self.client.clone();
            tasks.spawn(async move { (x, y, fetch_tile(&client, &url).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (x, y, tile) = joined.map_err(|e| RenderError::Task(e.to_string()))?;
            if let Some(tile) = tile? {
                let (offset_x, offset_y) = viewport.tile_offset(x, y);
                let tile = fit_tile(tile, viewport.tile_size);
                image::imageops::overlay(canvas, &tile, offset_x, offset_y);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl RenderEngine for TileMapRenderer {
    async fn render(&self, request: &MapRequest) -> Result<Bytes, RenderError> {
        let mut canvas = RgbaImage::from_pixel(request.width(), request.height(), BACKGROUND);
        let viewport = self.viewport(request);
        let zoom = request.zoom();

        self.draw_layer(&mut canvas, &self.base, &viewport, zoom).await?;
        for overlay in request.overlays() {
            debug!(overlay = %overlay.name, "Drawing overlay layer");
            let source = TileSource::from(overlay);
            self.draw_layer(&mut canvas, &source, &viewport, zoom).await?;
        }

        for marker in request.markers() {
            draw_marker(&mut canvas, &viewport, marker);
        }

        encode_png(canvas)
    }
}

/// Fetch and decode one tile. `Ok(None)` when the server has no such tile.
async fn fetch_tile(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<DynamicImage>, RenderError> {
    let fetch_error = |message: String| RenderError::TileFetch {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    match response.status() {
        StatusCode::NOT_FOUND => return Ok(None),
        status if !status.is_success() => return Err(fetch_error(format!("HTTP {}", status))),
        _ => {}
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    image::load_from_memory(&body)
        .map(Some)
        .map_err(|e| RenderError::TileDecode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

// =============================================================================
// Drawing
// =============================================================================

/// Scale a decoded tile to the grid's `tile_size` square.
fn fit_tile(tile: DynamicImage, tile_size: u32) -> RgbaImage {
    let tile = tile.to_rgba8();
    if tile.dimensions() == (tile_size, tile_size) {
        return tile;
    }
    image::imageops::resize(&tile, tile_size, tile_size, FilterType::Triangle)
}

/// Draw a marker as a filled disc with a darker rim, alpha-blended.
fn draw_marker(canvas: &mut RgbaImage, viewport: &Viewport, marker: &Marker) {
    let (cx, cy) = viewport.project(marker.position);
    let radius = marker.size.pixels() as f64 / 2.0;
    let color = marker.color;
    let fill = [color.r, color.g, color.b];
    let rim = [color.r / 2, color.g / 2, color.b / 2];
    let alpha = color.a as f64 / 255.0;

    let x_start = (cx - radius).floor().max(0.0) as u32;
    let y_start = (cy - radius).floor().max(0.0) as u32;
    let x_end = ((cx + radius).ceil().max(0.0) as u32).min(canvas.width());
    let y_end = ((cy + radius).ceil().max(0.0) as u32).min(canvas.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > radius {
                continue;
            }

            let src = if distance > radius - 1.5 { rim } else { fill };
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended = src[channel] as f64 * alpha + pixel.0[channel] as f64 * (1.0 - alpha);
                pixel.0[channel] = blended.round() as u8;
            }
        }
    }
}

fn encode_png(canvas: RgbaImage) -> Result<Bytes, RenderError> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(Bytes::from(out.into_inner()))
}
