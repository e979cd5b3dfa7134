//! Failure taxonomy for thumbnail generation and caching
//!
//! None of these are fatal. Callers log them and keep the placeholder.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Missing file, permission problem, I/O error while reading, or an
    /// unsupported/corrupt image.
    #[error("cannot read source image {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Creating the cache directory, writing the temp file or renaming it failed.
    #[error("thumbnail cache I/O failed at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode thumbnail for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl ThumbnailError {
    /// True when the source itself is the problem, as opposed to the cache directory.
    pub fn is_source_error(&self) -> bool {
        matches!(self, ThumbnailError::SourceUnreadable { .. } | ThumbnailError::Encode { .. })
    }

    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ThumbnailError::CacheIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        ThumbnailError::SourceUnreadable {
            path: path.into(),
            source,
        }
    }
}
