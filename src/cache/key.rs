//! Content-addressed cache keys.
//!
//! A key is the hex SHA-256 of a canonical string built from every field of
//! a [`MapRequest`] plus a version tag:
//!
//! ```text
//! {version}:::{center}|{zoom}|{marker+marker+...}|{width}x{height}|{disable_attribution}|{sha256(overlay::overlay)}
//! ```
//!
//! Bumping the version tag orphans every previously stored image without
//! touching the store: old files are simply never looked up again.

use sha2::{Digest, Sha256};

use crate::request::MapRequest;

/// Version tag mixed into every key.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of leading hex characters used as the shard directory name.
pub const SHARD_PREFIX_LEN: usize = 2;

/// Fixed-length hex digest identifying one rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `request` under `version`.
    pub fn derive(request: &MapRequest, version: &str) -> Self {
        let digest = Sha256::digest(canonical_string(request, version).as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shard directory name.
    pub fn shard(&self) -> &str {
        &self.0[..SHARD_PREFIX_LEN]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The string that gets hashed into a [`CacheKey`].
pub fn canonical_string(request: &MapRequest, version: &str) -> String {
    let markers = request
        .markers()
        .iter()
        .map(|m| m.canonical())
        .collect::<Vec<_>>()
        .join("+");

    let overlays = request
        .overlays()
        .iter()
        .map(|o| o.pattern.as_str())
        .collect::<Vec<_>>()
        .join("::");
    let overlay_digest = hex::encode(Sha256::digest(overlays.as_bytes()));

    format!(
        "{}:::{}|{}|{}|{}x{}|{}|{}",
        version,
        request.center().canonical(),
        request.zoom(),
        markers,
        request.width(),
        request.height(),
        request.disable_attribution(),
        overlay_digest,
    )
}

// =============================================================================
// Tests
// =============================================================================
