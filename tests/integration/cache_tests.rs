//! Render cache integration tests.
//!
//! Tests verify:
//! - TTL 0 renders every time and persists nothing
//! - A positive TTL serves repeats from disk
//! - Concurrent cold requests render once and leave a readable file
//! - A render outlives the request that started it
//! - Keys separate requests that differ only in order or version

use std::sync::Arc;
use std::time::Duration;

use tower::ServiceExt;

use staticmap::cache::DEFAULT_CACHE_TTL;
use staticmap::request::{RequestParser, SizeBounds};
use staticmap::{CacheKey, RenderCache};

use super::test_utils::{body_bytes, get, is_valid_png, CountingEngine, TestApp};

const MAP_QUERY: &str = "/map.png?center=48.8566,2.3522&zoom=10&size=32x32";

fn parse(query: &str) -> staticmap::MapRequest {
    RequestParser::new(SizeBounds::new(1024, 1024))
        .from_query(query)
        .unwrap()
}

fn count_files(dir: &std::path::Path) -> usize {
    walk(dir).len()
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(walk(&path));
        } else {
            files.push(path);
        }
    }
    files
}

// =============================================================================
// TTL
// =============================================================================

#[tokio::test]
async fn test_zero_ttl_always_renders() {
    let app = TestApp::new(Duration::ZERO);

    for _ in 0..2 {
        let response = app.router().oneshot(get(MAP_QUERY)).await.unwrap();
        assert_eq!(response.headers().get("x-map-cache-hit").unwrap(), "false");
    }

    assert_eq!(app.engine.calls(), 2);
    assert_eq!(count_files(app.dir.path()), 0, "TTL 0 must not persist");
}

#[tokio::test]
async fn test_positive_ttl_serves_from_disk() {
    let app = TestApp::new(DEFAULT_CACHE_TTL);

    let first = app.router().oneshot(get(MAP_QUERY)).await.unwrap();
    assert_eq!(first.headers().get("x-map-cache-hit").unwrap(), "false");
    let first_body = body_bytes(first).await;

    let second = app.router().oneshot(get(MAP_QUERY)).await.unwrap();
    assert_eq!(second.headers().get("x-map-cache-hit").unwrap(), "true");
    let second_body = body_bytes(second).await;

    assert_eq!(app.engine.calls(), 1);
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn test_persisted_layout() {
    let app = TestApp::new(DEFAULT_CACHE_TTL);
    let cache = app.cache();
    let request = parse("center=48.8566,2.3522&zoom=10&size=32x32");

    cache.fetch(&request).await.unwrap();

    let key = cache.key_for(&request);
    let expected = app
        .dir
        .path()
        .join(&key.as_str()[..2])
        .join(format!("{}.png", key));

    assert_eq!(walk(app.dir.path()), vec![expected.clone()]);
    assert!(is_valid_png(&std::fs::read(expected).unwrap()));
}

#[tokio::test]
async fn test_failed_render_persists_nothing() {
    let app = TestApp::with_engine(CountingEngine::failing(), DEFAULT_CACHE_TTL);

    let response = app.router().oneshot(get(MAP_QUERY)).await.unwrap();
    assert_eq!(response.status(), 500);

    let response = app.router().oneshot(get(MAP_QUERY)).await.unwrap();
    assert_eq!(response.status(), 500);

    assert_eq!(app.engine.calls(), 2, "failures are not cached");
    assert_eq!(count_files(app.dir.path()), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_cold_key_renders_once() {
    let app = TestApp::with_engine(
        CountingEngine::slow(Duration::from_millis(50)),
        DEFAULT_CACHE_TTL,
    );
    let cache = Arc::new(app.cache());
    let request = parse("center=48.8566,2.3522&zoom=10&size=32x32");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        let request = request.clone();
        handles.push(tokio::spawn(async move { cache.fetch(&request).await }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        let image = handle.await.unwrap().unwrap();
        bodies.push(image.data);
    }

    assert_eq!(app.engine.calls(), 1);
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));

    let path = cache.path_for(&cache.key_for(&request));
    let stored = std::fs::read(&path).unwrap();
    assert_eq!(stored, bodies[0].as_ref());
    assert_eq!(count_files(app.dir.path()), 1, "no temp files left behind");
}

#[tokio::test]
async fn test_concurrent_distinct_keys_render_independently() {
    let app = TestApp::new(DEFAULT_CACHE_TTL);
    let cache = Arc::new(app.cache());

    let mut handles = Vec::new();
    for zoom in 1..=4 {
        let cache = Arc::clone(&cache);
        let request = parse(&format!("center=0,0&zoom={}&size=16x16", zoom));
        handles.push(tokio::spawn(async move { cache.fetch(&request).await }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().unwrap().cache_hit);
    }

    assert_eq!(app.engine.calls(), 4);
    assert_eq!(count_files(app.dir.path()), 4);
}

#[tokio::test]
async fn test_timed_out_request_still_fills_cache() {
    let app = TestApp::with_engine(
        CountingEngine::slow(Duration::from_millis(100)),
        DEFAULT_CACHE_TTL,
    );
    let cache = app.cache();
    let request = parse("center=48.8566,2.3522&zoom=10&size=32x32");

    let abandoned = tokio::time::timeout(Duration::from_millis(20), cache.fetch(&request)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(count_files(app.dir.path()), 1);

    assert!(cache.fetch(&request).await.unwrap().cache_hit);
    assert_eq!(app.engine.calls(), 1);
}

// =============================================================================
// Keys
// =============================================================================

#[test]
fn test_key_is_deterministic() {
    let a = parse("center=1,2&zoom=3&size=10x10&markers=color:blue%7C1,1");
    let b = parse("size=10x10&markers=color:blue%7C1,1&zoom=3&center=1,2");
    assert_eq!(CacheKey::derive(&a, "1"), CacheKey::derive(&b, "1"));
}

#[test]
fn test_key_is_order_sensitive() {
    let a = parse("center=1,2&zoom=3&size=10x10&markers=1,1&markers=2,2");
    let b = parse("center=1,2&zoom=3&size=10x10&markers=2,2&markers=1,1");
    assert_ne!(CacheKey::derive(&a, "1"), CacheKey::derive(&b, "1"));
}

#[test]
fn test_key_distinguishes_attribution_flag() {
    let a = parse("center=1,2&zoom=3&size=10x10");
    let b = parse("center=1,2&zoom=3&size=10x10&no-attribution=true");
    assert_ne!(CacheKey::derive(&a, "1"), CacheKey::derive(&b, "1"));
}

#[tokio::test]
async fn test_version_change_misses() {
    let app = TestApp::new(DEFAULT_CACHE_TTL);
    let request = parse("center=1,2&zoom=3&size=10x10");

    let v1 = RenderCache::with_shared_engine(Arc::clone(&app.engine), app.cache_config.clone())
        .with_version("1.0.0");
    let v2 = RenderCache::with_shared_engine(Arc::clone(&app.engine), app.cache_config.clone())
        .with_version("2.0.0");

    assert!(!v1.fetch(&request).await.unwrap().cache_hit);
    assert!(v1.fetch(&request).await.unwrap().cache_hit);
    assert!(!v2.fetch(&request).await.unwrap().cache_hit);

    assert_eq!(app.engine.calls(), 2);
    assert_eq!(count_files(app.dir.path()), 2);
}
