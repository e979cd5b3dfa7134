//! Single-flight capture metadata loading for the selected entry
//!
//! At most one load is live. Starting a new one (or selecting nothing) cancels
//! the previous token and forgets its request id, so a reply from the old load
//! is rejected in [`MetadataLoader::apply`] even if the worker missed the
//! cancellation and delivered anyway.

use crate::cancel::CancellationToken;
use crate::entry::ListEntry;
use capture_metadata::{CaptureMetadata, MetadataSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the metadata panel should show
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataView {
    /// Nothing selected, or a folder is selected
    Empty,
    Loading { path: PathBuf },
    Loaded { path: PathBuf, metadata: CaptureMetadata },
    /// The file carried no readable metadata
    NotAvailable { path: PathBuf },
}

impl MetadataView {
    pub fn metadata(&self) -> Option<&CaptureMetadata> {
        match self {
            MetadataView::Loaded { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            MetadataView::Empty => None,
            MetadataView::Loading { path }
            | MetadataView::Loaded { path, .. }
            | MetadataView::NotAvailable { path } => Some(path),
        }
    }
}

/// Result of one background extraction, addressed by request id
#[derive(Debug, Clone)]
pub struct MetadataReply {
    request: u64,
    path: PathBuf,
    metadata: Option<CaptureMetadata>,
}

impl MetadataReply {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct PendingLoad {
    request: u64,
    token: CancellationToken,
}

type DeliverFn = Arc<dyn Fn(MetadataReply) + Send + Sync>;

pub struct MetadataLoader {
    source: Arc<dyn MetadataSource>,
    deliver: DeliverFn,
    pending: Option<PendingLoad>,
    next_request: u64,
    view: MetadataView,
}

impl MetadataLoader {
    /// `deliver` runs on a worker thread and should only hand the reply back to
    /// the coordination thread (typically by sending it over a channel).
    pub fn new<F>(source: Arc<dyn MetadataSource>, deliver: F) -> Self
    where
        F: Fn(MetadataReply) + Send + Sync + 'static,
    {
        Self {
            source,
            deliver: Arc::new(deliver),
            pending: None,
            next_request: 1,
            view: MetadataView::Empty,
        }
    }

    pub fn view(&self) -> &MetadataView {
        &self.view
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Cancel whatever is in flight and start loading for `target`.
    ///
    /// Folders and `None` leave the view empty with nothing pending.
    pub fn load_for(&mut self, target: Option<&ListEntry>) {
        self.cancel();

        let Some(entry) = target.filter(|entry| !entry.is_folder()) else {
            self.view = MetadataView::Empty;
            return;
        };

        let request = self.next_request;
        self.next_request += 1;
        let token = CancellationToken::new();
        let path = entry.path().to_path_buf();

        self.pending = Some(PendingLoad {
            request,
            token: token.clone(),
        });
        self.view = MetadataView::Loading { path: path.clone() };

        let source = Arc::clone(&self.source);
        let deliver = Arc::clone(&self.deliver);
        rayon::spawn(move || {
            if token.is_cancelled() {
                return;
            }

            let metadata = match source.extract(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::debug!("No metadata for {}: {:#}", path.display(), e);
                    None
                }
            };

            if token.is_cancelled() {
                log::trace!("Metadata load for {} cancelled", path.display());
                return;
            }

            deliver(MetadataReply {
                request,
                path,
                metadata,
            });
        });
    }

    /// Cancel the live load, if any, without waiting for its worker.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            if matches!(self.view, MetadataView::Loading { .. }) {
                self.view = MetadataView::Empty;
            }
        }
    }

    /// Apply a reply on the coordination thread.
    ///
    /// Returns false, touching nothing, unless the reply belongs to the live
    /// load and that load has not been cancelled.
    pub fn apply(&mut self, reply: MetadataReply) -> bool {
        let is_live = self.pending.as_ref().is_some_and(|pending| {
            pending.request == reply.request && !pending.token.is_cancelled()
        });
        if !is_live {
            log::trace!("Discarding metadata reply for {}", reply.path.display());
            return false;
        }

        self.pending = None;
        self.view = match reply.metadata {
            Some(metadata) if !metadata.is_empty() => MetadataView::Loaded {
                path: reply.path,
                metadata,
            },
            _ => MetadataView::NotAvailable { path: reply.path },
        };
        true
    }

    #[cfg(test)]
    fn pending_request(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.request)
    }
}

impl Drop for MetadataLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FileItem;
    use anyhow::{bail, Result};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::{Duration, SystemTime};

    /// Blocks on `slow.jpg` until released; names the camera after the file.
    struct GatedSource {
        gate: Receiver<()>,
    }

    impl MetadataSource for GatedSource {
        fn extract(&self, path: &Path) -> Result<Option<CaptureMetadata>> {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            match name.as_deref() {
                Some("slow.jpg") => {
                    let _ = self.gate.recv_timeout(Duration::from_secs(10));
                }
                Some("broken.jpg") => bail!("corrupt EXIF block"),
                Some("plain.jpg") => return Ok(None),
                _ => {}
            }
            Ok(Some(CaptureMetadata {
                camera_model: name,
                ..Default::default()
            }))
        }
    }

    fn loader() -> (MetadataLoader, Receiver<MetadataReply>, Sender<()>) {
        let (gate_tx, gate_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        let loader = MetadataLoader::new(Arc::new(GatedSource { gate: gate_rx }), move |reply| {
            let _ = reply_tx.send(reply);
        });
        (loader, reply_rx, gate_tx)
    }

    fn photo(name: &str) -> ListEntry {
        ListEntry::new(FileItem::file(format!("/photos/{name}"), 1, SystemTime::UNIX_EPOCH))
    }

    fn next_reply(replies: &Receiver<MetadataReply>) -> MetadataReply {
        replies
            .recv_timeout(Duration::from_secs(10))
            .expect("metadata reply")
    }

    #[test]
    fn test_newer_load_supersedes_older() {
        let (mut loader, replies, gate) = loader();

        loader.load_for(Some(&photo("slow.jpg")));
        let first_request = loader.pending_request().expect("first load pending");
        assert_eq!(
            loader.view(),
            &MetadataView::Loading { path: PathBuf::from("/photos/slow.jpg") }
        );

        loader.load_for(Some(&photo("fast.jpg")));
        assert_ne!(loader.pending_request(), Some(first_request));
        gate.send(()).expect("release slow load");

        let reply = next_reply(&replies);
        assert_eq!(reply.path(), Path::new("/photos/fast.jpg"));
        assert!(loader.apply(reply));
        assert_eq!(
            loader.view().metadata().and_then(|m| m.camera_model.as_deref()),
            Some("fast.jpg")
        );
        assert!(!loader.is_pending());

        // Even if the superseded load had delivered, it must not be applied
        let late = MetadataReply {
            request: first_request,
            path: PathBuf::from("/photos/slow.jpg"),
            metadata: Some(CaptureMetadata {
                camera_model: Some("slow.jpg".to_string()),
                ..Default::default()
            }),
        };
        assert!(!loader.apply(late));
        assert_eq!(loader.view().path(), Some(Path::new("/photos/fast.jpg")));

        // The cancelled worker observes its token after extraction and stays silent
        assert!(replies.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_folder_and_none_clear_the_view() {
        let (mut loader, replies, _gate) = loader();

        loader.load_for(Some(&photo("fast.jpg")));
        let stale = next_reply(&replies);

        let folder = ListEntry::new(FileItem::folder("/photos/Trips", SystemTime::UNIX_EPOCH));
        loader.load_for(Some(&folder));
        assert_eq!(loader.view(), &MetadataView::Empty);
        assert!(!loader.is_pending());
        assert!(!loader.apply(stale));

        loader.load_for(None);
        assert_eq!(loader.view(), &MetadataView::Empty);
    }

    #[test]
    fn test_missing_or_failed_metadata_is_not_available() {
        let (mut loader, replies, _gate) = loader();

        loader.load_for(Some(&photo("plain.jpg")));
        assert!(loader.apply(next_reply(&replies)));
        assert_eq!(
            loader.view(),
            &MetadataView::NotAvailable { path: PathBuf::from("/photos/plain.jpg") }
        );

        loader.load_for(Some(&photo("broken.jpg")));
        assert!(loader.apply(next_reply(&replies)));
        assert!(matches!(loader.view(), MetadataView::NotAvailable { .. }));
    }

    #[test]
    fn test_cancel_discards_in_flight_reply() {
        let (mut loader, replies, _gate) = loader();

        loader.load_for(Some(&photo("fast.jpg")));
        let request = loader.pending_request().expect("pending");
        loader.cancel();
        assert_eq!(loader.view(), &MetadataView::Empty);

        let reply = replies
            .recv_timeout(Duration::from_millis(500))
            .unwrap_or(MetadataReply {
                request,
                path: PathBuf::from("/photos/fast.jpg"),
                metadata: None,
            });
        assert!(!loader.apply(reply));
        assert_eq!(loader.view(), &MetadataView::Empty);
    }
}
