//! Cache key derivation
//!
//! A key is a truncated SHA-256 over the absolute source path, its modification
//! time and the thumbnail parameters. Every field is written as
//! `tag | u64 length | bytes`, so two different input tuples can never produce
//! the same byte stream before hashing.

use crate::ThumbnailParams;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const KEY_LEN: usize = 16;
const DOMAIN: &[u8] = b"folio-thumbnail-key";

const FIELD_PATH: u8 = 1;
const FIELD_MTIME: u8 = 2;
const FIELD_MAX_DIMENSION: u8 = 3;
const FIELD_QUALITY: u8 = 4;
const FIELD_FORMAT_VERSION: u8 = 5;

/// Opaque, fixed-length identifier of one cached thumbnail.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; KEY_LEN]);

impl CacheKey {
    /// Derive the key for a source file.
    ///
    /// # Panics
    ///
    /// Panics if `path` is empty or relative. Callers resolve paths before asking
    /// for a key.
    pub fn derive(path: &Path, modified: SystemTime, params: &ThumbnailParams) -> Self {
        assert!(
            !path.as_os_str().is_empty(),
            "cache key requested for an empty path"
        );
        assert!(
            path.is_absolute(),
            "cache key requires an absolute path, got {}",
            path.display()
        );

        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        write_field(&mut hasher, FIELD_PATH, path.as_os_str().as_encoded_bytes());
        write_field(&mut hasher, FIELD_MTIME, &encode_time(modified));
        write_field(
            &mut hasher,
            FIELD_MAX_DIMENSION,
            &params.max_dimension.to_le_bytes(),
        );
        write_field(&mut hasher, FIELD_QUALITY, &[params.quality]);
        write_field(
            &mut hasher,
            FIELD_FORMAT_VERSION,
            params.format_version.as_bytes(),
        );

        let digest = hasher.finalize();
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest[..KEY_LEN]);
        Self(bytes)
    }

    /// Lowercase hex rendering, always 32 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

fn write_field(hasher: &mut Sha256, tag: u8, bytes: &[u8]) {
    hasher.update([tag]);
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Sign byte, whole seconds and nanoseconds relative to the Unix epoch.
fn encode_time(time: SystemTime) -> [u8; 13] {
    let (sign, offset) = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (1u8, after),
        Err(before) => (0u8, before.duration()),
    };

    let mut out = [0u8; 13];
    out[0] = sign;
    out[1..9].copy_from_slice(&offset.as_secs().to_le_bytes());
    out[9..13].copy_from_slice(&offset.subsec_nanos().to_le_bytes());
    out
}

/// Read a file's metadata, canonicalize its path and derive its key.
pub fn cache_key_for_file(file_path: &Path, params: &ThumbnailParams) -> Result<CacheKey> {
    let metadata = fs::metadata(file_path)
        .with_context(|| format!("Failed to stat {}", file_path.display()))?;
    let absolute_path = file_path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", file_path.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", file_path.display()))?;

    Ok(CacheKey::derive(&absolute_path, modified, params))
}
