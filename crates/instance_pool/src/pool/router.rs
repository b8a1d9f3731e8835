//! Index Router
//!
//! Maps logical instance indices onto `(batch, offset)` slot addresses and
//! back. The mapping is stable for as long as the batch size is unchanged.

/// Location of one instance inside the batch array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddress {
    /// Index of the owning batch
    pub batch: usize,
    /// Slot within that batch
    pub offset: usize,
}

/// Stateless index arithmetic for a fixed batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRouter {
    batch_size: usize,
}

impl IndexRouter {
    /// Create a router. `batch_size` must be non-zero; the pool validates it.
    pub fn new(batch_size: usize) -> Self {
        debug_assert!(batch_size > 0, "batch size must be non-zero");
        Self { batch_size }
    }

    /// Slots per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Split a logical index into its batch and offset
    pub fn to_batch(&self, index: usize) -> SlotAddress {
        SlotAddress {
            batch: index / self.batch_size,
            offset: index % self.batch_size,
        }
    }

    /// Join a batch and offset back into a logical index
    pub fn to_logical(&self, batch: usize, offset: usize) -> usize {
        batch * self.batch_size + offset
    }

    /// Route `index` if it lies inside `capacity`, `None` otherwise
    pub fn route(&self, index: usize, capacity: usize) -> Option<SlotAddress> {
        (index < capacity).then(|| self.to_batch(index))
    }

    /// Distinct batches covering the logical range `[start, start + len)`
    pub fn batches_spanning(&self, start: usize, len: usize) -> std::ops::Range<usize> {
        if len == 0 {
            return 0..0;
        }
        let first = start / self.batch_size;
        let last = (start + len - 1) / self.batch_size;
        first..last + 1
    }

    /// Drawn slot count for `batch` when the first `active` logical slots are live
    pub fn active_in_batch(&self, batch: usize, active: usize) -> usize {
        active
            .saturating_sub(batch * self.batch_size)
            .min(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_batch_and_back() {
        let router = IndexRouter::new(4);
        let address = router.to_batch(9);

        assert_eq!(address, SlotAddress { batch: 2, offset: 1 });
        assert_eq!(router.to_logical(address.batch, address.offset), 9);

        for index in 0..37 {
            let SlotAddress { batch, offset } = router.to_batch(index);
            assert!(offset < 4);
            assert_eq!(router.to_logical(batch, offset), index);
        }
    }

    #[test]
    fn test_route_rejects_out_of_range() {
        let router = IndexRouter::new(4);
        assert!(router.route(9, 10).is_some());
        assert!(router.route(10, 10).is_none());
        assert!(router.route(0, 0).is_none());
    }

    #[test]
    fn test_batches_spanning() {
        let router = IndexRouter::new(4);
        assert_eq!(router.batches_spanning(0, 0), 0..0);
        assert_eq!(router.batches_spanning(0, 4), 0..1);
        assert_eq!(router.batches_spanning(3, 2), 0..2);
        assert_eq!(router.batches_spanning(5, 7), 1..3);
    }

    #[test]
    fn test_active_in_batch_clamps() {
        let router = IndexRouter::new(4);
        let counts: Vec<usize> = (0..3).map(|b| router.active_in_batch(b, 7)).collect();
        assert_eq!(counts, vec![4, 3, 0]);
        assert_eq!(router.active_in_batch(2, 100), 4);
    }
}
