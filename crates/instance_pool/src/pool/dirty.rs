//! Dirty Tracker
//!
//! Records which batches received writes since the last flush, and which of
//! their buffers changed. A batch is `Dirty` while it has at least one change
//! flag recorded; draining returns every entry and leaves all batches `Clean`.

use std::collections::BTreeMap;

use bitflags::bitflags;

bitflags! {
    /// Buffers of a batch that changed since the last flush
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BatchChanges: u8 {
        /// Transform buffer was written
        const MATRICES = 0b01;
        /// Color buffer was written
        const COLORS = 0b10;
    }
}

/// Per-batch flush state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    /// Host buffers and bounds reflect every write
    Clean,
    /// Writes are pending until the next flush
    Dirty,
}

/// Set of dirty batch indices, ordered by batch
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    pending: BTreeMap<usize, BatchChanges>,
}

impl DirtyTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `changes` were written into `batch`
    pub fn mark(&mut self, batch: usize, changes: BatchChanges) {
        if changes.is_empty() {
            return;
        }
        *self.pending.entry(batch).or_default() |= changes;
    }

    /// Record a transform write into `batch`
    pub fn mark_dirty(&mut self, batch: usize) {
        self.mark(batch, BatchChanges::MATRICES);
    }

    /// Record the same changes for every batch in `batches`
    pub fn mark_range(&mut self, batches: std::ops::Range<usize>, changes: BatchChanges) {
        for batch in batches {
            self.mark(batch, changes);
        }
    }

    /// Current state of `batch`
    pub fn state(&self, batch: usize) -> BatchState {
        if self.pending.contains_key(&batch) {
            BatchState::Dirty
        } else {
            BatchState::Clean
        }
    }

    /// Changes pending for `batch` (empty when clean)
    pub fn changes(&self, batch: usize) -> BatchChanges {
        self.pending.get(&batch).copied().unwrap_or_default()
    }

    /// Dirty batch indices in ascending order
    pub fn dirty_batches(&self) -> Vec<usize> {
        self.pending.keys().copied().collect()
    }

    /// Number of dirty batches
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when every batch is clean
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending entry, leaving the tracker empty
    pub fn drain_dirty(&mut self) -> Vec<(usize, BatchChanges)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Forget entries for batches at or beyond `batch_count`
    pub fn truncate(&mut self, batch_count: usize) {
        self.pending.retain(|batch, _| *batch < batch_count);
    }

    /// Forget every entry without flushing
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_state() {
        let mut tracker = DirtyTracker::new();
        assert_eq!(tracker.state(3), BatchState::Clean);

        tracker.mark_dirty(3);
        assert_eq!(tracker.state(3), BatchState::Dirty);
        assert_eq!(tracker.changes(3), BatchChanges::MATRICES);
        assert_eq!(tracker.state(2), BatchState::Clean);
    }

    #[test]
    fn test_changes_accumulate_per_batch() {
        let mut tracker = DirtyTracker::new();
        tracker.mark(1, BatchChanges::MATRICES);
        tracker.mark(1, BatchChanges::COLORS);
        tracker.mark(1, BatchChanges::MATRICES);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.changes(1), BatchChanges::MATRICES | BatchChanges::COLORS);
    }

    #[test]
    fn test_empty_changes_do_not_dirty() {
        let mut tracker = DirtyTracker::new();
        tracker.mark(0, BatchChanges::empty());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_drain_clears_atomically() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_range(2..5, BatchChanges::COLORS);
        tracker.mark_dirty(0);

        let drained = tracker.drain_dirty();
        let indices: Vec<usize> = drained.iter().map(|(batch, _)| *batch).collect();

        assert_eq!(indices, vec![0, 2, 3, 4]);
        assert!(tracker.is_empty());
        assert!(tracker.drain_dirty().is_empty());
    }

    #[test]
    fn test_truncate_drops_removed_batches() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_range(0..6, BatchChanges::MATRICES);
        tracker.truncate(2);

        assert_eq!(tracker.dirty_batches(), vec![0, 1]);
    }
}
