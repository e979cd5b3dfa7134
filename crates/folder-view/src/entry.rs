//! List entries and the key/generation pair that guards thumbnail loads

use crate::enumerate::is_supported_image;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use thumbnail_cache::CacheKey;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ListEntry`].
///
/// Ids are never reused, so a result addressed to an entry from a folder that
/// is no longer shown finds nothing to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A folder or file as reported by the enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub path: PathBuf,
    pub is_folder: bool,
    pub size_bytes: u64,
    pub modified: SystemTime,
    pub created: Option<SystemTime>,
}

impl FileItem {
    pub fn folder(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            is_folder: true,
            size_bytes: 0,
            modified,
            created: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>, size_bytes: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            is_folder: false,
            size_bytes,
            modified,
            created: None,
        }
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Files with a recognised image extension; folders never are.
    pub fn is_image(&self) -> bool {
        !self.is_folder && is_supported_image(&self.path)
    }
}

/// Identifies one thumbnail load attempt for one entry.
///
/// Produced by [`ListEntry::begin_load`]; a result is only applied if the entry
/// still carries exactly this key and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub key: CacheKey,
    pub generation: u64,
}

/// Encoded thumbnail held by an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailImage {
    /// Key the bytes were published under
    pub key: CacheKey,
    pub bytes: Vec<u8>,
    pub cache_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryIcon {
    Folder,
    /// Image whose thumbnail is not available yet
    Placeholder,
    Thumbnail,
    File,
}

/// Derived display state, recomputed whenever the entry changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVisual {
    pub icon: EntryIcon,
    pub resolution_label: Option<String>,
}

/// One row of the folder view
#[derive(Debug, Clone)]
pub struct ListEntry {
    id: EntryId,
    item: FileItem,
    thumbnail: Option<ThumbnailImage>,
    dimensions: Option<(u32, u32)>,
    thumbnail_key: Option<CacheKey>,
    generation: u64,
    visual: EntryVisual,
}

impl ListEntry {
    pub fn new(item: FileItem) -> Self {
        let mut entry = Self {
            id: EntryId::next(),
            item,
            thumbnail: None,
            dimensions: None,
            thumbnail_key: None,
            generation: 0,
            visual: EntryVisual {
                icon: EntryIcon::File,
                resolution_label: None,
            },
        };
        entry.refresh_visual();
        entry
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn item(&self) -> &FileItem {
        &self.item
    }

    pub fn path(&self) -> &Path {
        &self.item.path
    }

    pub fn display_name(&self) -> String {
        self.item.display_name()
    }

    pub fn is_folder(&self) -> bool {
        self.item.is_folder
    }

    pub fn is_image(&self) -> bool {
        self.item.is_image()
    }

    pub fn thumbnail(&self) -> Option<&ThumbnailImage> {
        self.thumbnail.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// True if the shown thumbnail was produced for the entry's current key.
    pub fn has_current_thumbnail(&self) -> bool {
        match (&self.thumbnail, self.thumbnail_key) {
            (Some(image), Some(key)) => image.key == key,
            _ => false,
        }
    }

    pub fn thumbnail_key(&self) -> Option<CacheKey> {
        self.thumbnail_key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn visual(&self) -> &EntryVisual {
        &self.visual
    }

    /// Point the entry at `key` and start a new load generation.
    ///
    /// The returned ticket is the pair now current on the entry; any ticket
    /// handed out earlier is stale from this point on. Moving to a different
    /// key drops the thumbnail and resolution of the previous one, so the entry
    /// shows a placeholder until a result for the new key arrives.
    pub fn begin_load(&mut self, key: CacheKey) -> LoadTicket {
        if self.thumbnail_key != Some(key) {
            self.thumbnail = None;
            self.dimensions = None;
        }
        self.thumbnail_key = Some(key);
        self.generation += 1;
        self.refresh_visual();
        LoadTicket {
            key,
            generation: self.generation,
        }
    }

    /// The ticket a result would have to carry to be applied right now.
    pub fn current_ticket(&self) -> Option<LoadTicket> {
        self.thumbnail_key.map(|key| LoadTicket {
            key,
            generation: self.generation,
        })
    }

    /// Replace the file item after a re-listing of the same path.
    pub(crate) fn update_item(&mut self, item: FileItem) {
        self.item = item;
        self.refresh_visual();
    }

    pub(crate) fn set_thumbnail(&mut self, image: ThumbnailImage, dimensions: Option<(u32, u32)>) {
        self.thumbnail = Some(image);
        if dimensions.is_some() {
            self.dimensions = dimensions;
        }
        self.refresh_visual();
    }

    pub(crate) fn set_dimensions(&mut self, dimensions: (u32, u32)) {
        self.dimensions = Some(dimensions);
        self.refresh_visual();
    }

    fn refresh_visual(&mut self) {
        let icon = if self.item.is_folder {
            EntryIcon::Folder
        } else if self.has_current_thumbnail() {
            EntryIcon::Thumbnail
        } else if self.item.is_image() {
            EntryIcon::Placeholder
        } else {
            EntryIcon::File
        };

        self.visual = EntryVisual {
            icon,
            resolution_label: self.dimensions.map(|(w, h)| format!("{} x {}", w, h)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbnail_cache::ThumbnailParams;

    fn key_for(name: &str) -> CacheKey {
        CacheKey::derive(
            Path::new(&format!("/photos/{name}")),
            SystemTime::UNIX_EPOCH,
            &ThumbnailParams::default(),
        )
    }

    #[test]
    fn test_begin_load_returns_current_pair() {
        let mut entry = ListEntry::new(FileItem::file("/photos/a.jpg", 10, SystemTime::UNIX_EPOCH));
        assert_eq!(entry.generation(), 0);
        assert!(entry.current_ticket().is_none());

        let first = entry.begin_load(key_for("a.jpg"));
        assert_eq!(first.generation, 1);
        assert_eq!(entry.current_ticket(), Some(first));

        let second = entry.begin_load(key_for("a.jpg"));
        assert_eq!(second.generation, 2);
        assert_ne!(entry.current_ticket(), Some(first));
        assert_eq!(entry.current_ticket(), Some(second));
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let item = FileItem::file("/photos/a.jpg", 10, SystemTime::UNIX_EPOCH);
        let a = ListEntry::new(item.clone());
        let b = ListEntry::new(item);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_visual_state() {
        let folder = ListEntry::new(FileItem::folder("/photos/Trips", SystemTime::UNIX_EPOCH));
        assert_eq!(folder.visual().icon, EntryIcon::Folder);
        assert!(!folder.is_image());

        let notes = ListEntry::new(FileItem::file("/photos/notes.txt", 1, SystemTime::UNIX_EPOCH));
        assert_eq!(notes.visual().icon, EntryIcon::File);

        let photo_item = FileItem::file("/photos/IMG_0001.JPG", 1, SystemTime::UNIX_EPOCH);
        let mut photo = ListEntry::new(photo_item);
        assert_eq!(photo.visual().icon, EntryIcon::Placeholder);
        assert_eq!(photo.display_name(), "IMG_0001.JPG");

        let key = key_for("IMG_0001.JPG");
        photo.begin_load(key);
        photo.set_thumbnail(
            ThumbnailImage {
                key,
                bytes: vec![1, 2, 3],
                cache_path: PathBuf::from("/cache/x.jpg"),
            },
            Some((6000, 4000)),
        );
        assert_eq!(photo.visual().icon, EntryIcon::Thumbnail);
        assert!(photo.has_current_thumbnail());
        assert_eq!(photo.visual().resolution_label.as_deref(), Some("6000 x 4000"));

        // Same key again keeps the picture
        photo.begin_load(key);
        assert!(photo.has_current_thumbnail());
        assert_eq!(photo.visual().icon, EntryIcon::Thumbnail);

        // Re-keyed: back to a placeholder with no resolution
        photo.begin_load(key_for("IMG_0001-edited.JPG"));
        assert!(photo.thumbnail().is_none());
        assert!(!photo.has_current_thumbnail());
        assert_eq!(photo.dimensions(), None);
        assert_eq!(photo.visual().icon, EntryIcon::Placeholder);
        assert_eq!(photo.visual().resolution_label, None);
    }
}
