//! Folder enumeration

use crate::entry::FileItem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Extensions listed as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Supplies the immediate children of a folder, in any order
pub trait FolderSource: Send + Sync {
    fn list(&self, folder: &Path) -> Result<Vec<FileItem>>;
}

/// Lists a directory on the local filesystem.
///
/// Keeps sub-folders and supported images. Item paths are absolute. Children
/// whose metadata cannot be read are skipped rather than failing the listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFolderSource {
    pub include_hidden: bool,
}

impl FsFolderSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FolderSource for FsFolderSource {
    fn list(&self, folder: &Path) -> Result<Vec<FileItem>> {
        let folder = fs::canonicalize(folder)
            .with_context(|| format!("Failed to resolve folder {}", folder.display()))?;
        let read_dir = fs::read_dir(&folder)
            .with_context(|| format!("Failed to read folder {}", folder.display()))?;

        let mut items = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(e) => {
                    log::debug!("Skipping unreadable entry in {}: {}", folder.display(), e);
                    continue;
                }
            };

            let path = dir_entry.path();
            let hidden = dir_entry.file_name().to_string_lossy().starts_with('.');
            if hidden && !self.include_hidden {
                continue;
            }

            // Follows symlinks so linked folders and images are listed like real ones
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let is_folder = metadata.is_dir();
            if !is_folder && !(metadata.is_file() && is_supported_image(&path)) {
                continue;
            }

            items.push(FileItem {
                path,
                is_folder,
                size_bytes: if is_folder { 0 } else { metadata.len() },
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
                created: metadata.created().ok(),
            });
        }

        log::debug!("Listed {} items in {}", items.len(), folder.display());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(Path::new("/a/IMG_1.JPG")));
        assert!(is_supported_image(Path::new("/a/scan.TiFF")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("/a/notes.txt")));
        assert!(!is_supported_image(Path::new("/a/jpg")));
    }

    #[test]
    fn test_lists_folders_and_images_only() -> Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        fs::create_dir(root.join("Trips"))?;
        fs::create_dir(root.join(".thumbs"))?;
        fs::write(root.join("a.jpg"), b"0123456789")?;
        fs::write(root.join("b.PNG"), b"x")?;
        fs::write(root.join("readme.txt"), b"x")?;
        fs::write(root.join(".hidden.jpg"), b"x")?;

        let items = FsFolderSource::new().list(root)?;
        let names: BTreeSet<String> = items.iter().map(FileItem::display_name).collect();
        assert_eq!(
            names,
            ["Trips", "a.jpg", "b.PNG"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );

        for item in &items {
            assert!(item.path.is_absolute());
        }
        let photo = items.iter().find(|i| i.display_name() == "a.jpg").expect("a.jpg listed");
        assert_eq!(photo.size_bytes, 10);
        assert!(!photo.is_folder);
        assert!(items.iter().any(|i| i.is_folder && i.display_name() == "Trips"));

        let with_hidden = FsFolderSource { include_hidden: true }.list(root)?;
        assert_eq!(with_hidden.len(), 5);
        Ok(())
    }

    #[test]
    fn test_missing_folder_is_an_error() -> Result<()> {
        let temp_dir = tempdir()?;
        assert!(FsFolderSource::new().list(&temp_dir.path().join("gone")).is_err());
        Ok(())
    }
}
