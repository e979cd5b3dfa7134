//! Priority-ordered background pass that fills thumbnail cache misses
//!
//! Requests inside the priority window (typically the visible rows) are loaded
//! first, then the pass expands outward in both directions. Each request carries
//! an opaque ticket that is handed back with the result, so the caller can decide
//! whether the result is still wanted. Cancelling a job only raises a flag; it
//! never waits for the worker to wind down.

use crate::cache::{LoadedThumbnail, ThumbnailCache};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

/// Small chunks keep cancellation responsive.
const CHUNK_SIZE: usize = 4;

/// One source image the pass should produce a thumbnail for
#[derive(Debug, Clone)]
pub struct PrefetchRequest<T> {
    pub ticket: T,
    pub source: PathBuf,
    pub modified: SystemTime,
}

/// A batch of requests plus the window that should be served first
#[derive(Debug, Clone)]
pub struct PrefetchJob<T> {
    pub requests: Vec<PrefetchRequest<T>>,
    pub priority_start: usize,
    pub priority_end: usize,
}

impl<T> PrefetchJob<T> {
    /// Job with no priority window; requests are visited in order.
    pub fn new(requests: Vec<PrefetchRequest<T>>) -> Self {
        Self {
            requests,
            priority_start: 0,
            priority_end: 0,
        }
    }

    /// Prioritize `size` requests starting at `start`, clamped to the request list.
    pub fn with_priority_window(mut self, start: usize, size: usize) -> Self {
        let len = self.requests.len();
        self.priority_start = start.min(len);
        self.priority_end = start.saturating_add(size).min(len);
        self
    }
}

/// Progress information for a prefetch job
#[derive(Debug, Clone, Default)]
pub struct PrefetchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub is_cancelled: bool,
    pub is_finished: bool,
}

impl PrefetchProgress {
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            ((self.completed + self.failed) as f64 / self.total as f64) * 100.0
        }
    }
}

/// Background scheduler that runs at most one prefetch job at a time
pub struct PrefetchScheduler {
    cache: Arc<ThumbnailCache>,
    current_job: Mutex<Option<PrefetchJobHandle>>,
}

struct PrefetchJobHandle {
    cancel_flag: Arc<AtomicBool>,
    progress: Arc<Mutex<PrefetchProgress>>,
}

impl PrefetchScheduler {
    pub fn new(cache: Arc<ThumbnailCache>) -> Self {
        Self {
            cache,
            current_job: Mutex::new(None),
        }
    }

    /// Start a job, cancelling whatever was running.
    ///
    /// `sink` is called from worker threads with each request's ticket and its
    /// loaded thumbnail. Failures are logged and counted, not delivered.
    pub fn start<T, F>(&self, job: PrefetchJob<T>, sink: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T, LoadedThumbnail) + Send + Sync + 'static,
    {
        self.cancel_current_job();

        let progress = Arc::new(Mutex::new(PrefetchProgress {
            total: job.requests.len(),
            ..Default::default()
        }));
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let cache = Arc::clone(&self.cache);
        let progress_clone = Arc::clone(&progress);
        let cancel_flag_clone = Arc::clone(&cancel_flag);

        thread::spawn(move || {
            Self::execute_job(&cache, job, sink, &progress_clone, &cancel_flag_clone);
        });

        *self.current_job.lock() = Some(PrefetchJobHandle {
            cancel_flag,
            progress,
        });
    }

    /// Flag the current job as cancelled and forget about it. Does not block.
    pub fn cancel_current_job(&self) {
        if let Some(job_handle) = self.current_job.lock().take() {
            job_handle.cancel_flag.store(true, Ordering::Relaxed);
            job_handle.progress.lock().is_cancelled = true;
        }
    }

    pub fn get_progress(&self) -> Option<PrefetchProgress> {
        self.current_job
            .lock()
            .as_ref()
            .map(|job_handle| job_handle.progress.lock().clone())
    }

    pub fn is_running(&self) -> bool {
        self.get_progress()
            .map(|progress| !progress.is_finished && !progress.is_cancelled)
            .unwrap_or(false)
    }

    fn execute_job<T, F>(
        cache: &ThumbnailCache,
        job: PrefetchJob<T>,
        sink: F,
        progress: &Mutex<PrefetchProgress>,
        cancel_flag: &AtomicBool,
    ) where
        T: Clone + Send + Sync,
        F: Fn(T, LoadedThumbnail) + Send + Sync,
    {
        let order = priority_order(job.requests.len(), job.priority_start, job.priority_end);
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        for chunk in order.chunks(CHUNK_SIZE) {
            if cancel_flag.load(Ordering::Relaxed) {
                break;
            }

            chunk.par_iter().for_each(|&index| {
                if cancel_flag.load(Ordering::Relaxed) {
                    return;
                }

                let request = &job.requests[index];
                match cache.load(&request.source, request.modified) {
                    Ok(loaded) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                        if !cancel_flag.load(Ordering::Relaxed) {
                            sink(request.ticket.clone(), loaded);
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to load thumbnail for {}: {}",
                            request.source.display(),
                            e
                        );
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }

                let mut progress_guard = progress.lock();
                progress_guard.completed = completed.load(Ordering::Relaxed);
                progress_guard.failed = failed.load(Ordering::Relaxed);
            });
        }

        let mut progress_guard = progress.lock();
        progress_guard.completed = completed.load(Ordering::Relaxed);
        progress_guard.failed = failed.load(Ordering::Relaxed);
        progress_guard.is_finished = true;
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel_current_job();
    }
}

/// Visit order for `len` items: the `[start, end)` window first, then alternating
/// outward (one before the window, one after) until everything is covered.
pub fn priority_order(len: usize, start: usize, end: usize) -> Vec<usize> {
    let start = start.min(len);
    let end = end.clamp(start, len);

    let mut order: Vec<usize> = (start..end).collect();
    let mut before = (0..start).rev();
    let mut after = end..len;

    loop {
        let mut added = false;
        if let Some(index) = before.next() {
            order.push(index);
            added = true;
        }
        if let Some(index) = after.next() {
            order.push(index);
            added = true;
        }
        if !added {
            break;
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ThumbnailStore;
    use crate::ThumbnailParams;
    use anyhow::Result;
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn wait_until_finished(scheduler: &PrefetchScheduler) -> PrefetchProgress {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            let progress = scheduler.get_progress().expect("job registered");
            if progress.is_finished || Instant::now() > deadline {
                return progress;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_priority_order_expands_outward() {
        assert_eq!(priority_order(6, 2, 4), vec![2, 3, 1, 4, 0, 5]);
        assert_eq!(priority_order(3, 0, 0), vec![0, 1, 2]);
        assert_eq!(priority_order(4, 3, 10), vec![3, 2, 1, 0]);
        assert!(priority_order(0, 0, 5).is_empty());
    }

    #[test]
    fn test_priority_window_is_clamped() {
        let requests = (0..2)
            .map(|i| PrefetchRequest {
                ticket: i,
                source: PathBuf::from(format!("/photos/{i}.jpg")),
                modified: SystemTime::UNIX_EPOCH,
            })
            .collect();

        let job = PrefetchJob::new(requests).with_priority_window(1, 10);
        assert_eq!(job.priority_start, 1);
        assert_eq!(job.priority_end, 2);
    }

    #[test]
    fn test_progress_calculations() {
        let progress = PrefetchProgress {
            total: 100,
            completed: 20,
            failed: 5,
            is_cancelled: false,
            is_finished: false,
        };
        assert_eq!(progress.completion_percentage(), 25.0);
        assert_eq!(PrefetchProgress::default().completion_percentage(), 100.0);
    }

    #[test]
    fn test_job_delivers_every_readable_source() -> Result<()> {
        let temp_dir = tempdir()?;
        let mut requests = Vec::new();
        for i in 0..6 {
            let source = temp_dir.path().join(format!("img{i}.png"));
            RgbImage::from_pixel(50, 40, Rgb([i as u8 * 40, 0, 0])).save(&source)?;
            requests.push(PrefetchRequest {
                ticket: i,
                modified: fs::metadata(&source)?.modified()?,
                source,
            });
        }
        let broken = temp_dir.path().join("broken.jpg");
        fs::write(&broken, b"nope")?;
        requests.push(PrefetchRequest {
            ticket: 99,
            modified: fs::metadata(&broken)?.modified()?,
            source: broken,
        });

        let cache = Arc::new(ThumbnailCache::new(
            ThumbnailStore::open(temp_dir.path().join("cache"))?,
            ThumbnailParams::default(),
        ));
        let scheduler = PrefetchScheduler::new(Arc::clone(&cache));
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let sink_target = Arc::clone(&delivered);
        scheduler.start(PrefetchJob::new(requests), move |ticket, loaded| {
            assert!(loaded.generated);
            sink_target.lock().push(ticket);
        });

        let progress = wait_until_finished(&scheduler);
        assert_eq!(progress.completed, 6);
        assert_eq!(progress.failed, 1);
        assert!(!scheduler.is_running());

        let mut tickets = delivered.lock().clone();
        tickets.sort();
        assert_eq!(tickets, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(cache.stats().generated, 6);
        Ok(())
    }

    #[test]
    fn test_cancel_does_not_block_and_marks_progress() -> Result<()> {
        let temp_dir = tempdir()?;
        let cache = Arc::new(ThumbnailCache::new(
            ThumbnailStore::open(temp_dir.path())?,
            ThumbnailParams::default(),
        ));
        let scheduler = PrefetchScheduler::new(cache);
        assert!(!scheduler.is_running());
        assert!(scheduler.get_progress().is_none());

        let requests = (0..50)
            .map(|i| PrefetchRequest {
                ticket: i,
                source: temp_dir.path().join(format!("missing{i}.jpg")),
                modified: SystemTime::UNIX_EPOCH,
            })
            .collect();
        scheduler.start(PrefetchJob::new(requests), |_: i32, _| {});
        scheduler.cancel_current_job();

        assert!(!scheduler.is_running());
        assert!(scheduler.get_progress().is_none());
        Ok(())
    }
}
