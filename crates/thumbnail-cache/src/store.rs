//! On-disk thumbnail store addressed by [`CacheKey`]
//!
//! Every entry is a single `<hex>.jpg` file directly under the cache root.
//! Entries are created once through [`ThumbnailStore::publish`] and never
//! modified or removed afterwards.

use crate::error::ThumbnailError;
use crate::key::CacheKey;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ENTRY_EXTENSION: &str = "jpg";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ThumbnailError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ThumbnailError::cache_io(&root, e))?;
        Ok(Self { root })
    }

    /// A store that does not touch the filesystem until the first publish.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform cache directory, e.g. `~/.cache/folio/thumbnails` on Linux.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("folio")
            .join("thumbnails")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location an entry for `key` lives at, whether or not it exists yet.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key.to_hex(), ENTRY_EXTENSION))
    }

    /// Cheap existence check; no decoding.
    pub fn try_read(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Bytes of a published entry.
    pub fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    /// Atomically publish `bytes` as the entry for `key`.
    ///
    /// The data goes to a uniquely named temp file next to the final path and is
    /// renamed over it, so readers see either no file or a complete one. The temp
    /// file is removed on every failure path.
    pub fn publish(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf, ThumbnailError> {
        fs::create_dir_all(&self.root).map_err(|e| ThumbnailError::cache_io(&self.root, e))?;

        let final_path = self.path_for(key);
        let prefix = format!("{}.", key.to_hex());
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| ThumbnailError::cache_io(&self.root, e))?;

        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| ThumbnailError::cache_io(temp.path(), e))?;

        // On failure `PersistError` hands the temp file back; dropping it deletes it.
        temp.persist(&final_path)
            .map_err(|e| ThumbnailError::cache_io(&final_path, e.error))?;

        log::debug!("Published thumbnail {}", final_path.display());
        Ok(final_path)
    }
}
