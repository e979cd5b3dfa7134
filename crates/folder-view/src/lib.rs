//! Folder list model for Folio
//!
//! Owns the list of entries a folder view displays and reconciles everything
//! that arrives asynchronously (folder listings, thumbnails, capture metadata)
//! against it. All list mutation happens on the thread that owns the
//! [`FolderBrowser`]; background work only sends results back over a channel.
//!
//! - [`ListEntry`] carries a thumbnail key and a generation counter
//! - [`LoadCoordinator`] applies a thumbnail only if that pair is unchanged
//! - [`MetadataLoader`] keeps a single cancellable metadata read in flight
//! - [`sort`] orders folders first, then files, by natural name order

pub mod browser;
pub mod cancel;
pub mod coordinator;
pub mod entry;
pub mod enumerate;
pub mod metadata_loader;
pub mod sort;

pub use browser::{BrowserEvent, FolderBrowser};
pub use cancel::CancellationToken;
pub use coordinator::{ApplyOutcome, CoordinatorStats, LoadCoordinator, ThumbnailResult};
pub use entry::{EntryIcon, EntryId, EntryVisual, FileItem, ListEntry, LoadTicket, ThumbnailImage};
pub use enumerate::{is_supported_image, FolderSource, FsFolderSource, IMAGE_EXTENSIONS};
pub use metadata_loader::{MetadataLoader, MetadataReply, MetadataView};
pub use sort::{NameComparator, NaturalComparator, SortColumn, SortDirection, SortOrder};
