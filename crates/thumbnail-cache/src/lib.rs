//! Content-addressed thumbnail generation and disk caching for Folio
//!
//! This crate turns a source image into a small JPEG thumbnail exactly once per
//! (file, modification time, generation parameters) combination and keeps the
//! result on disk so later folder loads can show it without decoding anything.
//!
//! # Features
//!
//! - **Stable cache keys**: SHA-256 over the absolute path, mtime and parameters
//! - **Atomic publish**: thumbnails are written to a temp file and renamed into place
//! - **Shrink-only resizing**: Lanczos3 downscale into a square bounding box
//! - **Background pass**: cancellable, priority-ordered generation of cache misses

pub mod cache;
pub mod error;
pub mod generate;
pub mod key;
pub mod prefetch;
pub mod store;

pub use cache::{CacheStats, CachedThumbnail, LoadedThumbnail, ThumbnailCache};
pub use error::ThumbnailError;
pub use generate::{generate_thumbnail, probe_dimensions, GeneratedThumbnail};
pub use key::{cache_key_for_file, CacheKey};
pub use prefetch::{PrefetchJob, PrefetchProgress, PrefetchRequest, PrefetchScheduler};
pub use store::ThumbnailStore;

use serde::{Deserialize, Serialize};

/// Bumped whenever the encoded thumbnail format changes, so old entries stop matching.
pub const CACHE_FORMAT_VERSION: &str = "v1";

/// Parameters that shape a generated thumbnail. All of them feed the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailParams {
    /// Edge of the square bounding box the thumbnail must fit in
    pub max_dimension: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
    pub format_version: String,
}

impl ThumbnailParams {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: quality.clamp(1, 100),
            format_version: CACHE_FORMAT_VERSION.to_string(),
        }
    }
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self::new(300, 80)
    }
}
