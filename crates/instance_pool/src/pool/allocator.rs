//! Batch Allocator
//!
//! Sizes the batch array to cover a logical capacity. New batches come back
//! from the host with every slot parked far outside the working volume, so
//! an inactive slot is never drawn or hit even when the visible count is
//! left too high. Trailing batches are handed back to the host on shrink.

use crate::error::PoolResult;
use crate::foundation::math::{parked_matrix, Mat4};
use crate::pool::backend::{InstanceBackend, InstancedDrawable, ShapeDescriptor};

/// What a call to [`BatchAllocator::reallocate`] changed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reallocation {
    /// Index range of freshly allocated batches
    pub added: std::ops::Range<usize>,
    /// Number of trailing batches released
    pub released: usize,
}

/// Grows and shrinks the batch array of a pool
#[derive(Debug, Clone)]
pub struct BatchAllocator {
    batch_size: usize,
    park_matrix: Mat4,
    with_colors: bool,
}

impl BatchAllocator {
    /// Create an allocator for batches of `batch_size` slots
    pub fn new(batch_size: usize, park_distance: f32, with_colors: bool) -> Self {
        Self {
            batch_size,
            park_matrix: parked_matrix(park_distance),
            with_colors,
        }
    }

    /// Slots per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Transform written into every unused slot
    pub fn park_matrix(&self) -> &Mat4 {
        &self.park_matrix
    }

    /// `ceil(max_instances / batch_size)`
    pub fn batches_needed(&self, max_instances: usize) -> usize {
        max_instances.div_ceil(self.batch_size)
    }

    /// Construct one batch with every slot parked and nothing drawn
    pub fn allocate<B: InstanceBackend>(
        &self,
        backend: &mut B,
        shape: &ShapeDescriptor,
    ) -> PoolResult<B::Drawable> {
        let mut drawable = backend.create_drawable(shape, self.batch_size, self.with_colors)?;
        for slot in 0..self.batch_size {
            drawable.set_matrix_at(slot, &self.park_matrix);
        }
        drawable.set_count(0);
        Ok(drawable)
    }

    /// Resize `batches` to cover `max_instances` logical slots
    ///
    /// Retained batches are untouched, so indices below the old capacity keep
    /// their contents. If the host fails partway through growing, the batches
    /// added by this call are released again and the error is returned.
    pub fn reallocate<B: InstanceBackend>(
        &self,
        backend: &mut B,
        shape: &ShapeDescriptor,
        batches: &mut Vec<B::Drawable>,
        max_instances: usize,
    ) -> PoolResult<Reallocation> {
        let needed = self.batches_needed(max_instances);
        let current = batches.len();

        if needed > current {
            batches.reserve(needed - current);
            for _ in current..needed {
                match self.allocate(backend, shape) {
                    Ok(drawable) => batches.push(drawable),
                    Err(err) => {
                        for drawable in batches.drain(current..) {
                            backend.release_drawable(drawable);
                        }
                        return Err(err);
                    }
                }
            }
            log::debug!("Allocated batches {}..{} for {}", current, needed, shape);
            return Ok(Reallocation {
                added: current..needed,
                released: 0,
            });
        }

        for drawable in batches.drain(needed..) {
            backend.release_drawable(drawable);
        }
        if needed < current {
            log::debug!("Released batches {}..{} for {}", needed, current, shape);
        }
        Ok(Reallocation {
            added: needed..needed,
            released: current - needed,
        })
    }

    /// Hand every batch back to the host
    pub fn release_all<B: InstanceBackend>(&self, backend: &mut B, batches: &mut Vec<B::Drawable>) {
        for drawable in batches.drain(..) {
            backend.release_drawable(drawable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use crate::foundation::math::{is_parked, DEFAULT_PARK_DISTANCE};
    use crate::pool::cpu::CpuBackend;

    fn allocator(batch_size: usize) -> BatchAllocator {
        BatchAllocator::new(batch_size, DEFAULT_PARK_DISTANCE, false)
    }

    #[test]
    fn test_batches_needed_rounds_up() {
        let alloc = allocator(4);
        assert_eq!(alloc.batches_needed(0), 0);
        assert_eq!(alloc.batches_needed(1), 1);
        assert_eq!(alloc.batches_needed(4), 1);
        assert_eq!(alloc.batches_needed(10), 3);
    }

    #[test]
    fn test_new_batches_are_parked_and_hidden() {
        let alloc = allocator(4);
        let mut backend = CpuBackend::new();
        let drawable = alloc.allocate(&mut backend, &ShapeDescriptor::unit_cube()).unwrap();

        assert_eq!(drawable.count(), 0);
        assert!((0..4).all(|slot| is_parked(&drawable.matrix_at(slot))));
    }

    #[test]
    fn test_grow_then_shrink() {
        let alloc = allocator(4);
        let shape = ShapeDescriptor::unit_cube();
        let mut backend = CpuBackend::new();
        let mut batches = Vec::new();

        let grown = alloc.reallocate(&mut backend, &shape, &mut batches, 10).unwrap();
        assert_eq!(grown.added, 0..3);
        assert_eq!(batches.len(), 3);

        let shrunk = alloc.reallocate(&mut backend, &shape, &mut batches, 5).unwrap();
        assert_eq!(shrunk.released, 1);
        assert!(shrunk.added.is_empty());
        assert_eq!(batches.len(), 2);
        assert_eq!(backend.live_drawables(), 2);

        alloc.release_all(&mut backend, &mut batches);
        assert_eq!(backend.live_drawables(), 0);
    }

    #[test]
    fn test_failed_growth_rolls_back() {
        let alloc = allocator(2);
        let shape = ShapeDescriptor::unit_cube();
        let mut backend = CpuBackend::with_allocation_limit(3);
        let mut batches = Vec::new();

        alloc.reallocate(&mut backend, &shape, &mut batches, 2).unwrap();
        let result = alloc.reallocate(&mut backend, &shape, &mut batches, 20);

        assert!(matches!(result, Err(PoolError::BackendAllocation { .. })));
        assert_eq!(batches.len(), 1);
        assert_eq!(backend.live_drawables(), 1);
    }
}
