//! Staleness guard for thumbnail results
//!
//! Thumbnail work completes in any order and possibly long after the entry it
//! was started for has moved on (re-keyed, reloaded, or dropped with its
//! folder). Every result therefore carries the [`LoadTicket`] it was started
//! with, and is applied only if the entry still carries the same key and
//! generation.

use crate::entry::{ListEntry, LoadTicket, ThumbnailImage};

/// A finished thumbnail load, ready to be applied to its entry
#[derive(Debug, Clone)]
pub struct ThumbnailResult {
    pub image: ThumbnailImage,
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The entry moved on or no longer exists; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub applied: usize,
    pub stale: usize,
}

/// Applies asynchronous results to entries on the owning thread
#[derive(Debug, Default)]
pub struct LoadCoordinator {
    stats: CoordinatorStats,
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `ticket` still matches the entry's key and generation.
    pub fn is_current(entry: &ListEntry, ticket: &LoadTicket) -> bool {
        entry.thumbnail_key() == Some(ticket.key) && entry.generation() == ticket.generation
    }

    pub fn apply_thumbnail(
        &mut self,
        entry: &mut ListEntry,
        ticket: &LoadTicket,
        result: ThumbnailResult,
    ) -> ApplyOutcome {
        if !Self::is_current(entry, ticket) || result.image.key != ticket.key {
            log::trace!(
                "Dropping stale thumbnail for {} (generation {} != {})",
                entry.display_name(),
                ticket.generation,
                entry.generation()
            );
            return self.discard();
        }

        entry.set_thumbnail(result.image, result.dimensions);
        self.stats.applied += 1;
        ApplyOutcome::Applied
    }

    /// Apply a source resolution that arrived separately from the thumbnail.
    pub fn apply_dimensions(
        &mut self,
        entry: &mut ListEntry,
        ticket: &LoadTicket,
        dimensions: (u32, u32),
    ) -> ApplyOutcome {
        if !Self::is_current(entry, ticket) {
            return self.discard();
        }

        entry.set_dimensions(dimensions);
        self.stats.applied += 1;
        ApplyOutcome::Applied
    }

    /// Record a result whose entry could not be found.
    pub fn discard(&mut self) -> ApplyOutcome {
        self.stats.stale += 1;
        ApplyOutcome::Stale
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }
}
