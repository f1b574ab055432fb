//! Tile renderer integration tests against a local tile server.
//!
//! Tests verify:
//! - Base tiles are fetched and stitched into an image of the requested size
//! - Overlays are composited over the base layer
//! - Overlays line up with a base layer of a different tile size
//! - Missing (404) overlay tiles leave the layer blank
//! - Tile server errors fail the render

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use image::Rgba;

use staticmap::error::RenderError;
use staticmap::render::{RenderEngine, TileMapRenderer, TileSource};
use staticmap::request::{RequestParser, SizeBounds};
use staticmap::MapRequest;

use super::test_utils::{is_valid_png, solid_png};

const BASE_COLOR: Rgba<u8> = Rgba([0, 128, 0, 255]);
const OVERLAY_COLOR: Rgba<u8> = Rgba([0, 0, 200, 255]);

// =============================================================================
// Local Tile Server
// =============================================================================

#[derive(Clone, Default)]
struct TileCounter(Arc<AtomicUsize>);

async fn base_tile(
    State(counter): State<TileCounter>,
    Path((_z, _x, _y)): Path<(u32, u32, String)>,
) -> impl IntoResponse {
    counter.0.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "image/png")],
        solid_png(256, 256, BASE_COLOR),
    )
}

async fn overlay_tile() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/png")],
        solid_png(256, 256, OVERLAY_COLOR),
    )
}

async fn large_base_tile(Path((_z, _x, _y)): Path<(u32, u32, String)>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/png")],
        solid_png(512, 512, BASE_COLOR),
    )
}

/// Blue for tile column 0, transparent elsewhere.
async fn column_tile(Path((_z, x, _y)): Path<(u32, u32, String)>) -> impl IntoResponse {
    let color = if x == 0 { OVERLAY_COLOR } else { Rgba([0, 0, 0, 0]) };
    (
        [(header::CONTENT_TYPE, "image/png")],
        solid_png(256, 256, color),
    )
}

async fn broken_tile() -> impl IntoResponse {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Serve tiles on an ephemeral port.
///
/// - `/base/{z}/{x}/{y}.png` - solid green, counted
/// - `/overlay/{z}/{x}/{y}.png` - solid blue
/// - `/large/{z}/{x}/{y}.png` - solid green, 512px
/// - `/column/{z}/{x}/{y}.png` - blue in column 0, transparent elsewhere
/// - `/broken/{z}/{x}/{y}.png` - 503
/// - anything else - 404
async fn spawn_tile_server() -> (SocketAddr, TileCounter) {
    let counter = TileCounter::default();
    let app = Router::new()
        .route("/base/{z}/{x}/{y}", get(base_tile))
        .route("/overlay/{z}/{x}/{y}", get(overlay_tile))
        .route("/large/{z}/{x}/{y}", get(large_base_tile))
        .route("/column/{z}/{x}/{y}", get(column_tile))
        .route("/broken/{z}/{x}/{y}", get(broken_tile))
        .with_state(counter.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, counter)
}

fn renderer(addr: SocketAddr, layer: &str) -> TileMapRenderer {
    sized_renderer(addr, layer, 256)
}

fn sized_renderer(addr: SocketAddr, layer: &str, tile_size: u32) -> TileMapRenderer {
    let template = format!("http://{}/{}/{{z}}/{{x}}/{{y}}.png", addr, layer);
    TileMapRenderer::new(TileSource::new(template, tile_size), "staticmap-test").unwrap()
}

fn parse(query: &str) -> MapRequest {
    RequestParser::new(SizeBounds::unbounded())
        .from_query(query)
        .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_render_base_layer() {
    let (addr, counter) = spawn_tile_server().await;
    let engine = renderer(addr, "base");

    let png = engine
        .render(&parse("center=0,0&zoom=1&size=64x48"))
        .await
        .unwrap();
    assert!(is_valid_png(&png));

    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (64, 48));
    assert_eq!(*image.get_pixel(0, 0), BASE_COLOR);
    assert_eq!(*image.get_pixel(63, 47), BASE_COLOR);

    // The center of a zoom 1 world is the corner of four tiles
    assert_eq!(counter.0.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_render_draws_markers() {
    let (addr, _) = spawn_tile_server().await;
    let engine = renderer(addr, "base");

    let png = engine
        .render(&parse(
            "center=10,10&zoom=5&size=64x64&markers=size:mid%7Ccolor:0xff0000%7C10,10",
        ))
        .await
        .unwrap();

    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(*image.get_pixel(32, 32), Rgba([255, 0, 0, 255]));
    assert_eq!(*image.get_pixel(0, 0), BASE_COLOR);
}

#[tokio::test]
async fn test_render_overlay_over_base() {
    let (addr, _) = spawn_tile_server().await;
    let engine = renderer(addr, "base");
    let overlay = format!(
        "http%3A%2F%2F{}%2Foverlay%2F%7B0%7D%2F%7B1%7D%2F%7B2%7D.png",
        addr
    );

    let png = engine
        .render(&parse(&format!(
            "center=0,0&zoom=2&size=32x32&overlays={}",
            overlay
        )))
        .await
        .unwrap();

    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert!(image.pixels().all(|p| *p == OVERLAY_COLOR));
}

#[tokio::test]
async fn test_overlay_follows_larger_base_grid() {
    let (addr, _) = spawn_tile_server().await;
    let engine = sized_renderer(addr, "large", 512);
    let overlay = format!(
        "http%3A%2F%2F{}%2Fcolumn%2F%7B0%7D%2F%7B1%7D%2F%7B2%7D.png",
        addr
    );

    // At zoom 1 on a 512px grid the canvas spans world x 212..812, so column 0
    // ends at canvas x 300 and no other tile column 0 is visible
    let png = engine
        .render(&parse(&format!(
            "center=0,0&zoom=1&size=600x64&overlays={}",
            overlay
        )))
        .await
        .unwrap();

    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (600, 64));
    for x in [10, 150, 290] {
        assert_eq!(*image.get_pixel(x, 32), OVERLAY_COLOR, "x = {}", x);
    }
    for x in [310, 450, 590] {
        assert_eq!(*image.get_pixel(x, 32), BASE_COLOR, "x = {}", x);
    }
}

#[tokio::test]
async fn test_missing_overlay_tiles_are_blank() {
    let (addr, _) = spawn_tile_server().await;
    let engine = renderer(addr, "base");
    let overlay = format!(
        "http%3A%2F%2F{}%2Fmissing%2F%7B0%7D%2F%7B1%7D%2F%7B2%7D.png",
        addr
    );

    let png = engine
        .render(&parse(&format!(
            "center=0,0&zoom=2&size=32x32&overlays={}",
            overlay
        )))
        .await
        .unwrap();

    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert!(image.pixels().all(|p| *p == BASE_COLOR));
}

#[tokio::test]
async fn test_tile_server_error_fails_render() {
    let (addr, _) = spawn_tile_server().await;
    let engine = renderer(addr, "broken");

    let err = engine
        .render(&parse("center=0,0&zoom=1&size=32x32"))
        .await
        .unwrap_err();

    match err {
        RenderError::TileFetch { url, message } => {
            assert!(url.contains("/broken/1/"));
            assert!(message.contains("503"));
        }
        other => panic!("expected TileFetch, got {other:?}"),
    }
}
