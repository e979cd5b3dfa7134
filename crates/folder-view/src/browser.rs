//! Folder browser view model
//!
//! [`FolderBrowser`] is owned by one coordination thread. It lists folders,
//! serves cached thumbnails synchronously while building the entry list, and
//! hands everything else (enumeration, thumbnail generation, metadata reads) to
//! worker threads. Workers answer over a channel; the owner drains it with
//! [`FolderBrowser::process_next`], [`FolderBrowser::drain`] or
//! [`FolderBrowser::run_until_idle`], and every result passes through the
//! staleness guard before it touches an entry.

use crate::coordinator::{ApplyOutcome, CoordinatorStats, LoadCoordinator, ThumbnailResult};
use crate::entry::{EntryId, FileItem, ListEntry, LoadTicket, ThumbnailImage};
use crate::enumerate::{FolderSource, FsFolderSource};
use crate::metadata_loader::{MetadataLoader, MetadataReply, MetadataView};
use crate::sort::{sort_entries, NameComparator, NaturalComparator, SortColumn, SortOrder};
use anyhow::Result;
use capture_metadata::MetadataSource;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thumbnail_cache::{
    LoadedThumbnail, PrefetchJob, PrefetchProgress, PrefetchRequest, PrefetchScheduler,
    ThumbnailCache,
};

/// Rows served before the prefetch pass expands outward
const DEFAULT_PRIORITY_WINDOW: usize = 32;

/// Upper bound on a single wait inside [`FolderBrowser::run_until_idle`]
const IDLE_POLL: Duration = Duration::from_millis(50);

/// What changed as the result of processing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    FolderLoaded {
        folder: PathBuf,
        total: usize,
        /// Images showing a thumbnail straight from the disk cache
        cached: usize,
        /// Images queued for background generation
        pending: usize,
    },
    FolderFailed {
        folder: PathBuf,
        error: String,
    },
    ThumbnailApplied {
        index: usize,
    },
    ThumbnailStale,
    MetadataUpdated,
    MetadataDiscarded,
}

enum Message {
    Listed {
        epoch: u64,
        folder: PathBuf,
        result: Result<Vec<FileItem>>,
    },
    Thumbnail {
        entry: EntryId,
        ticket: LoadTicket,
        loaded: LoadedThumbnail,
    },
    Metadata(MetadataReply),
}

pub struct FolderBrowser {
    cache: Arc<ThumbnailCache>,
    prefetch: PrefetchScheduler,
    folder_source: Arc<dyn FolderSource>,
    comparator: Box<dyn NameComparator>,
    metadata: MetadataLoader,
    coordinator: LoadCoordinator,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    folder: Option<PathBuf>,
    /// Bumped for every listing request; older listings are ignored
    epoch: u64,
    listing_pending: bool,
    entries: Vec<ListEntry>,
    positions: HashMap<EntryId, usize>,
    selected: Option<EntryId>,
    sort: SortOrder,
    priority_window: usize,
}

impl FolderBrowser {
    pub fn new(cache: Arc<ThumbnailCache>, metadata_source: Arc<dyn MetadataSource>) -> Self {
        let (sender, receiver) = unbounded();
        let metadata_sender = sender.clone();
        let metadata = MetadataLoader::new(metadata_source, move |reply| {
            let _ = metadata_sender.send(Message::Metadata(reply));
        });

        Self {
            prefetch: PrefetchScheduler::new(Arc::clone(&cache)),
            cache,
            folder_source: Arc::new(FsFolderSource::new()),
            comparator: Box::new(NaturalComparator),
            metadata,
            coordinator: LoadCoordinator::new(),
            sender,
            receiver,
            folder: None,
            epoch: 0,
            listing_pending: false,
            entries: Vec::new(),
            positions: HashMap::new(),
            selected: None,
            sort: SortOrder::default(),
            priority_window: DEFAULT_PRIORITY_WINDOW,
        }
    }

    pub fn with_folder_source(mut self, source: Arc<dyn FolderSource>) -> Self {
        self.folder_source = source;
        self
    }

    pub fn with_comparator(mut self, comparator: Box<dyn NameComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.sort = order;
        self
    }

    pub fn with_priority_window(mut self, rows: usize) -> Self {
        self.priority_window = rows.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ListEntry> {
        self.entries.get(index)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|id| self.positions.get(&id).copied())
    }

    pub fn selected_entry(&self) -> Option<&ListEntry> {
        self.selected_index().and_then(|index| self.entries.get(index))
    }

    pub fn metadata_view(&self) -> &MetadataView {
        self.metadata.view()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    pub fn prefetch_progress(&self) -> Option<PrefetchProgress> {
        self.prefetch.get_progress()
    }

    /// Switch to `folder`. The current list is dropped immediately; results
    /// still in flight for it will find no entry and be discarded.
    pub fn open_folder(&mut self, folder: impl Into<PathBuf>) {
        let folder = folder.into();
        log::info!("Opening {}", folder.display());

        self.prefetch.cancel_current_job();
        self.metadata.load_for(None);
        self.selected = None;
        self.entries.clear();
        self.positions.clear();
        self.folder = Some(folder.clone());
        self.request_listing(folder);
    }

    /// Re-list the current folder, keeping entries whose path is still present.
    pub fn refresh(&mut self) -> bool {
        let Some(folder) = self.folder.clone() else {
            return false;
        };
        self.prefetch.cancel_current_job();
        self.request_listing(folder);
        true
    }

    /// Select the entry at `index` (or nothing) and load its metadata.
    pub fn select(&mut self, index: Option<usize>) -> bool {
        let target = match index {
            Some(index) => match self.entries.get(index) {
                Some(entry) => Some(entry),
                None => return false,
            },
            None => None,
        };

        self.selected = target.map(ListEntry::id);
        self.metadata.load_for(target);
        true
    }

    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.entries.iter().position(|entry| entry.display_name() == name) {
            Some(index) => self.select(Some(index)),
            None => false,
        }
    }

    pub fn toggle_sort(&mut self, column: SortColumn) {
        self.sort.toggle(column);
        self.resort();
    }

    /// Restart the background pass so that rows from `index` onward are
    /// served first. Returns the number of queued images.
    pub fn prioritize_from(&mut self, index: usize) -> usize {
        self.start_prefetch(index)
    }

    /// True when no listing, thumbnail pass or metadata read is outstanding
    /// and every delivered message has been processed.
    pub fn is_idle(&self) -> bool {
        !self.listing_pending
            && !self.prefetch.is_running()
            && !self.metadata.is_pending()
            && self.receiver.is_empty()
    }

    /// Wait up to `timeout` for one message and process it.
    pub fn process_next(&mut self, timeout: Duration) -> Option<BrowserEvent> {
        let message = self.receiver.recv_timeout(timeout).ok()?;
        self.handle(message)
    }

    /// Process everything already delivered without waiting.
    pub fn drain(&mut self) -> Vec<BrowserEvent> {
        let messages: Vec<Message> = self.receiver.try_iter().collect();
        messages
            .into_iter()
            .filter_map(|message| self.handle(message))
            .collect()
    }

    /// Process messages until [`Self::is_idle`] or `timeout` elapses.
    pub fn run_until_idle(&mut self, timeout: Duration) -> Vec<BrowserEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();

        while !self.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Browser still busy after {:?}", timeout);
                break;
            }
            if let Some(event) = self.process_next((deadline - now).min(IDLE_POLL)) {
                events.push(event);
            }
        }

        events
    }

    fn request_listing(&mut self, folder: PathBuf) {
        self.epoch += 1;
        self.listing_pending = true;

        let epoch = self.epoch;
        let source = Arc::clone(&self.folder_source);
        let sender = self.sender.clone();
        rayon::spawn(move || {
            let result = source.list(&folder);
            let _ = sender.send(Message::Listed {
                epoch,
                folder,
                result,
            });
        });
    }

    fn handle(&mut self, message: Message) -> Option<BrowserEvent> {
        match message {
            Message::Listed {
                epoch,
                folder,
                result,
            } => {
                if epoch != self.epoch {
                    log::debug!("Ignoring superseded listing of {}", folder.display());
                    return None;
                }
                self.listing_pending = false;

                match result {
                    Ok(items) => Some(self.populate(folder, items)),
                    Err(e) => {
                        log::warn!("Failed to list {}: {:#}", folder.display(), e);
                        self.metadata.load_for(None);
                        self.selected = None;
                        self.entries.clear();
                        self.positions.clear();
                        Some(BrowserEvent::FolderFailed {
                            folder,
                            error: format!("{:#}", e),
                        })
                    }
                }
            }
            Message::Thumbnail {
                entry,
                ticket,
                loaded,
            } => {
                let result = ThumbnailResult {
                    image: ThumbnailImage {
                        key: loaded.key,
                        bytes: loaded.bytes,
                        cache_path: loaded.path,
                    },
                    dimensions: loaded.source_dimensions,
                };

                let target = self
                    .positions
                    .get(&entry)
                    .copied()
                    .and_then(|index| self.entries.get_mut(index).map(|entry| (index, entry)));
                let outcome = match target {
                    Some((index, entry)) => {
                        (index, self.coordinator.apply_thumbnail(entry, &ticket, result))
                    }
                    None => (0, self.coordinator.discard()),
                };

                match outcome {
                    (index, ApplyOutcome::Applied) => {
                        Some(BrowserEvent::ThumbnailApplied { index })
                    }
                    (_, ApplyOutcome::Stale) => Some(BrowserEvent::ThumbnailStale),
                }
            }
            Message::Metadata(reply) => {
                if self.metadata.apply(reply) {
                    Some(BrowserEvent::MetadataUpdated)
                } else {
                    Some(BrowserEvent::MetadataDiscarded)
                }
            }
        }
    }

    /// Build the entry list for a fresh listing, reusing entries whose path
    /// was already shown, then start the background pass for the misses.
    fn populate(&mut self, folder: PathBuf, items: Vec<FileItem>) -> BrowserEvent {
        let mut previous: HashMap<PathBuf, ListEntry> = self
            .entries
            .drain(..)
            .map(|entry| (entry.path().to_path_buf(), entry))
            .collect();

        let mut entries = Vec::with_capacity(items.len());
        let mut cached = 0;
        for item in items {
            let mut entry = match previous.remove(&item.path) {
                Some(mut existing) => {
                    existing.update_item(item);
                    existing
                }
                None => ListEntry::new(item),
            };
            if self.resolve_from_cache(&mut entry) {
                cached += 1;
            }
            entries.push(entry);
        }

        self.entries = entries;
        self.resort();
        let pending = self.start_prefetch(0);

        log::info!(
            "Listed {}: {} entries, {} cached thumbnails, {} to generate",
            folder.display(),
            self.entries.len(),
            cached,
            pending
        );
        BrowserEvent::FolderLoaded {
            folder,
            total: self.entries.len(),
            cached,
            pending,
        }
    }

    /// Fast path: point the entry at its current key and apply an existing
    /// thumbnail from disk if there is one. Returns true if the entry now
    /// shows a thumbnail for its current key.
    fn resolve_from_cache(&mut self, entry: &mut ListEntry) -> bool {
        if !entry.is_image() {
            return false;
        }
        if !entry.path().is_absolute() {
            log::warn!("Skipping thumbnail for relative path {}", entry.path().display());
            return false;
        }

        let modified = entry.item().modified;
        let key = self.cache.key_for(entry.path(), modified);
        if entry.thumbnail_key() == Some(key) && entry.has_current_thumbnail() {
            return true;
        }

        let ticket = entry.begin_load(key);
        let Some(hit) = self.cache.lookup(entry.path(), modified) else {
            return false;
        };

        let result = ThumbnailResult {
            image: ThumbnailImage {
                key: hit.key,
                bytes: hit.bytes,
                cache_path: hit.path,
            },
            dimensions: hit.source_dimensions,
        };
        self.coordinator.apply_thumbnail(entry, &ticket, result) == ApplyOutcome::Applied
    }

    /// Queue every image still lacking a current thumbnail, in display order,
    /// with the rows from `focus` onward served first.
    fn start_prefetch(&mut self, focus: usize) -> usize {
        self.prefetch.cancel_current_job();

        let mut requests = Vec::new();
        let mut window_start = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.has_current_thumbnail() {
                continue;
            }
            let Some(ticket) = entry.current_ticket() else {
                continue;
            };
            if index >= focus && window_start.is_none() {
                window_start = Some(requests.len());
            }
            requests.push(PrefetchRequest {
                ticket: (entry.id(), ticket),
                source: entry.path().to_path_buf(),
                modified: entry.item().modified,
            });
        }

        let pending = requests.len();
        if pending == 0 {
            return 0;
        }

        let job = PrefetchJob::new(requests)
            .with_priority_window(window_start.unwrap_or(pending), self.priority_window);
        let sender = self.sender.clone();
        self.prefetch.start(job, move |(entry, ticket), loaded| {
            let _ = sender.send(Message::Thumbnail { entry, ticket, loaded });
        });
        pending
    }

    fn resort(&mut self) {
        sort_entries(&mut self.entries, self.sort, self.comparator.as_ref());
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.id(), index))
            .collect();

        if let Some(id) = self.selected {
            if !self.positions.contains_key(&id) {
                self.selected = None;
                self.metadata.load_for(None);
            }
        }
    }
}
