//! User configuration (`<config dir>/folio/config.json`)

use anyhow::{Context, Result};
use folder_view::SortOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thumbnail_cache::{ThumbnailParams, ThumbnailStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Thumbnail cache root; the platform cache directory when unset
    pub cache_dir: Option<PathBuf>,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
    pub sort: SortOrder,
}

impl Default for AppConfig {
    fn default() -> Self {
        let params = ThumbnailParams::default();
        Self {
            cache_dir: None,
            thumbnail_size: params.max_dimension,
            thumbnail_quality: params.quality,
            sort: SortOrder::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("folio").join("config.json"))
    }

    /// Load `explicit` if given (it must exist), otherwise the default config
    /// file if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn thumbnail_params(&self) -> ThumbnailParams {
        ThumbnailParams::new(self.thumbnail_size, self.thumbnail_quality)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(ThumbnailStore::default_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folder_view::{SortColumn, SortDirection};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_thumbnail_params() {
        let config = AppConfig::default();
        assert_eq!(config.thumbnail_params(), ThumbnailParams::default());
        assert_eq!(config.sort, SortOrder::default());
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "thumbnail_size": 512, "sort": { "column": "size", "direction": "descending" } }"#,
        )?;

        let config = AppConfig::load(Some(&path))?;
        assert_eq!(config.thumbnail_size, 512);
        assert_eq!(config.thumbnail_quality, 80);
        assert_eq!(config.sort, SortOrder::new(SortColumn::Size, SortDirection::Descending));
        assert_eq!(config.thumbnail_params().max_dimension, 512);
        Ok(())
    }

    #[test]
    fn test_cache_dir_override() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("config.json");
        let config = AppConfig {
            cache_dir: Some(temp_dir.path().join("thumbs")),
            ..Default::default()
        };
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;

        let loaded = AppConfig::load_from(&path)?;
        assert_eq!(loaded, config);
        assert_eq!(loaded.cache_root(), temp_dir.path().join("thumbs"));
        Ok(())
    }

    #[test]
    fn test_bad_or_missing_explicit_file_is_an_error() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("config.json");
        assert!(AppConfig::load(Some(&path)).is_err());

        fs::write(&path, "{ not json")?;
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
        Ok(())
    }
}
