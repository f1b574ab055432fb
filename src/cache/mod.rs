//! Content-addressed render cache.
//!
//! Rendered maps are stored on disk under a digest of the request that
//! produced them, so any two equivalent requests share one file.
//!
//! # Layout
//!
//! ```text
//! {cache_dir}/
//! ├── 3f/
//! │   └── 3fa94c...e1.png
//! └── a0/
//!     └── a07b12...9c.png
//! ```
//!
//! There is no index: the existence and modification time of the leaf file
//! are the only metadata. Files older than the TTL are re-rendered and
//! overwritten on their next lookup. Nothing is ever deleted, so the store
//! grows with the number of distinct requests; prune it externally (for
//! example with `find -mtime`) if that matters.
//!
//! # Components
//!
//! - [`CacheKey`]: SHA-256 digest of a request's canonical form and a version tag
//! - [`RenderCache`]: lookup-or-render against the store with an injected engine
//! - [`CacheConfig`]: cache root and freshness window

mod key;
mod store;

pub use key::{canonical_string, CacheKey, CACHE_VERSION, SHARD_PREFIX_LEN};
pub use store::{
    CacheConfig, CachedImage, RenderCache, DEFAULT_CACHE_TTL, IMAGE_EXTENSION, PNG_CONTENT_TYPE,
};
