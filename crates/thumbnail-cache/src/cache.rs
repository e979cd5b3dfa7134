//! Thumbnail cache facade tying keys, the disk store and the generator together
//!
//! [`ThumbnailCache::lookup`] is the synchronous fast path used while a folder is
//! being listed: it only ever reads what is already on disk. [`ThumbnailCache::load`]
//! is what background workers call; it generates and publishes on a miss.

use crate::error::ThumbnailError;
use crate::generate::{generate_thumbnail, probe_dimensions};
use crate::key::CacheKey;
use crate::store::ThumbnailStore;
use crate::ThumbnailParams;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

/// A thumbnail found on disk by the fast path.
#[derive(Debug, Clone)]
pub struct CachedThumbnail {
    pub key: CacheKey,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Source pixel size, probed from the source header when available
    pub source_dimensions: Option<(u32, u32)>,
}

/// Result of a background load, either served from disk or freshly generated.
#[derive(Debug, Clone)]
pub struct LoadedThumbnail {
    pub key: CacheKey,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub source_dimensions: Option<(u32, u32)>,
    pub generated: bool,
}

/// Main thumbnail cache manager
pub struct ThumbnailCache {
    store: ThumbnailStore,
    params: ThumbnailParams,
    hits: AtomicUsize,
    generated: AtomicUsize,
    failures: AtomicUsize,
}

impl ThumbnailCache {
    pub fn new(store: ThumbnailStore, params: ThumbnailParams) -> Self {
        Self {
            store,
            params,
            hits: AtomicUsize::new(0),
            generated: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &ThumbnailStore {
        &self.store
    }

    pub fn key_for(&self, source: &Path, modified: SystemTime) -> CacheKey {
        CacheKey::derive(source, modified, &self.params)
    }

    /// Serve an existing thumbnail without generating anything.
    pub fn lookup(&self, source: &Path, modified: SystemTime) -> Option<CachedThumbnail> {
        let key = self.key_for(source, modified);
        let path = self.store.try_read(&key)?;
        let bytes = self.store.read(&key)?;
        self.hits.fetch_add(1, Ordering::Relaxed);

        Some(CachedThumbnail {
            key,
            path,
            bytes,
            source_dimensions: probe_dimensions(source),
        })
    }

    /// Get a thumbnail, generating and publishing it on a miss.
    ///
    /// A generated thumbnail that fails to publish is discarded and reported as
    /// [`ThumbnailError::CacheIo`]; the caller keeps its placeholder.
    pub fn load(
        &self,
        source: &Path,
        modified: SystemTime,
    ) -> Result<LoadedThumbnail, ThumbnailError> {
        let key = self.key_for(source, modified);

        if let Some(path) = self.store.try_read(&key) {
            if let Some(bytes) = self.store.read(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(LoadedThumbnail {
                    key,
                    path,
                    bytes,
                    source_dimensions: probe_dimensions(source),
                    generated: false,
                });
            }
        }

        let generated = generate_thumbnail(source, self.params.max_dimension, self.params.quality)
            .and_then(|thumb| {
                let path = self.store.publish(&key, &thumb.bytes)?;
                Ok((thumb, path))
            });

        match generated {
            Ok((thumb, path)) => {
                self.generated.fetch_add(1, Ordering::Relaxed);
                log::debug!("Generated thumbnail for {}", source.display());
                Ok(LoadedThumbnail {
                    key,
                    path,
                    bytes: thumb.bytes,
                    source_dimensions: Some((thumb.source_width, thumb.source_height)),
                    generated: true,
                })
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Counters for monitoring and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub generated: usize,
    pub failures: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.generated;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
