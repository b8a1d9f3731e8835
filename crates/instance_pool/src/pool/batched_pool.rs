//! Batched Instance Pool
//!
//! Maps a logical sequence of instances onto fixed-capacity instancing
//! batches and tracks which batches changed, so that upload flags and bounds
//! recomputation are only paid for batches that actually received writes.
//!
//! # Out-of-range policy
//!
//! Every per-frame operation is lenient: writes and reads at an index outside
//! `0..max_instances` are skipped without touching any batch. Bulk writes
//! apply the in-range prefix and drop the rest. Callers that need to know can
//! inspect the returned `bool`/count. Writing colors into a pool built
//! without colors is skipped the same way.
//!
//! # Batch size
//!
//! The logical-to-slot mapping depends on the batch size. Changing it through
//! [`BatchedInstancePool::rebuild_with_batch_size`] discards every written
//! transform and color; prior indices must be rewritten by the caller.

use crate::config::{Config, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::foundation::bounds::Aabb;
use crate::foundation::math::{Color, Mat4, Vec3, FAR_DISTANCE_THRESHOLD};
use crate::pool::allocator::BatchAllocator;
use crate::pool::backend::{InstanceBackend, InstancedDrawable, ShapeDescriptor};
use crate::pool::dirty::{BatchChanges, BatchState, DirtyTracker};
use crate::pool::router::IndexRouter;

/// Work performed by one call to [`BatchedInstancePool::flush`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Batches whose buffers were flagged for upload
    pub batches: usize,
    /// Bounding volumes recomputed
    pub bounds_recomputed: usize,
}

impl FlushReport {
    /// True when the flush found nothing dirty
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }
}

/// Statistics for an instance pool
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Allocated batches
    pub batch_count: usize,
    /// Logical capacity
    pub max_instances: usize,
    /// Logical slots currently drawn
    pub active_count: usize,
    /// Calls to `flush` since creation
    pub flushes: u64,
    /// Batches reconciled across all flushes
    pub batches_flushed: u64,
    /// Transform buffers flagged for upload
    pub matrix_uploads: u64,
    /// Color buffers flagged for upload
    pub color_uploads: u64,
    /// Bounding volumes recomputed, by flush or `compute_bounds`
    pub bounds_recomputations: u64,
}

/// Pool of logical instances spread over fixed-size host batches
///
/// All operations are synchronous bookkeeping meant to be driven from a
/// single update loop: write transforms and colors during the frame, then
/// call [`flush`](Self::flush) once before rendering.
///
/// # Usage
///
/// ```rust
/// use instance_pool::prelude::*;
///
/// let config = PoolConfig::new(4, 10).with_bounds(true);
/// let mut pool = BatchedInstancePool::new(&config, CpuBackend::new(), ShapeDescriptor::unit_cube())?;
///
/// pool.set_transform(9, &Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));
/// pool.set_active_count(7);
/// let report = pool.flush();
///
/// assert_eq!(pool.active_counts(), vec![4, 3, 0]);
/// assert_eq!(report.batches, 3);
/// # Ok::<(), PoolError>(())
/// ```
pub struct BatchedInstancePool<B: InstanceBackend> {
    backend: B,
    shape: ShapeDescriptor,
    router: IndexRouter,
    allocator: BatchAllocator,
    batches: Vec<B::Drawable>,
    dirty: DirtyTracker,
    max_instances: usize,
    active_count: usize,
    enable_colors: bool,
    enable_bounds: bool,
    park_distance: f32,
    stats: PoolStats,
}

impl<B: InstanceBackend> BatchedInstancePool<B> {
    /// Create a pool and allocate every batch needed for `config.max_instances`
    ///
    /// All slots start parked and every logical slot is drawn. New batches
    /// start dirty so the first flush uploads them.
    pub fn new(config: &PoolConfig, mut backend: B, shape: ShapeDescriptor) -> PoolResult<Self> {
        validate(config.batch_size, config.park_distance)?;

        let router = IndexRouter::new(config.batch_size);
        let allocator = BatchAllocator::new(config.batch_size, config.park_distance, config.enable_colors);
        let mut batches = Vec::new();
        allocator.reallocate(&mut backend, &shape, &mut batches, config.max_instances)?;

        let mut pool = Self {
            backend,
            shape,
            router,
            allocator,
            batches,
            dirty: DirtyTracker::new(),
            max_instances: config.max_instances,
            active_count: config.max_instances,
            enable_colors: config.enable_colors,
            enable_bounds: config.enable_bounds,
            park_distance: config.park_distance,
            stats: PoolStats::default(),
        };
        let fresh = pool.fresh_batch_changes();
        pool.dirty.mark_range(0..pool.batches.len(), fresh);
        pool.apply_active_count();

        log::info!(
            "Created instance pool for {} with {} batches of {} (max {} instances, colors: {}, bounds: {})",
            pool.shape, pool.batches.len(), config.batch_size, pool.max_instances,
            pool.enable_colors, pool.enable_bounds
        );
        Ok(pool)
    }

    /// Load a TOML or RON [`PoolConfig`] from `path` and create a pool from it
    pub fn from_config_file(path: &str, backend: B, shape: ShapeDescriptor) -> PoolResult<Self> {
        let config = PoolConfig::load_from_file(path)?;
        config.validate()?;
        log::debug!("Loaded pool configuration from {}", path);
        Self::new(&config, backend, shape)
    }

    /// Write the transform of one instance
    ///
    /// Returns `false` (and changes nothing) when `index` is out of range.
    pub fn set_transform(&mut self, index: usize, transform: &Mat4) -> bool {
        let Some(address) = self.router.route(index, self.max_instances) else {
            log::trace!("Ignoring transform write at {} (max {})", index, self.max_instances);
            return false;
        };

        self.batches[address.batch].set_matrix_at(address.offset, transform);
        self.dirty.mark(address.batch, BatchChanges::MATRICES);
        true
    }

    /// Write the color of one instance
    ///
    /// Returns `false` when colors are disabled or `index` is out of range.
    pub fn set_color(&mut self, index: usize, color: &Color) -> bool {
        if !self.enable_colors {
            log::trace!("Ignoring color write at {}: pool has no colors", index);
            return false;
        }
        let Some(address) = self.router.route(index, self.max_instances) else {
            log::trace!("Ignoring color write at {} (max {})", index, self.max_instances);
            return false;
        };

        self.batches[address.batch].set_color_at(address.offset, color);
        self.dirty.mark(address.batch, BatchChanges::COLORS);
        true
    }

    /// Write consecutive transforms starting at `start`
    ///
    /// Returns how many were written; entries past `max_instances` are dropped.
    pub fn set_transforms(&mut self, transforms: &[Mat4], start: usize) -> usize {
        let written = self.writable_len(start, transforms.len());
        for (i, transform) in transforms[..written].iter().enumerate() {
            let address = self.router.to_batch(start + i);
            self.batches[address.batch].set_matrix_at(address.offset, transform);
        }

        self.dirty.mark_range(self.router.batches_spanning(start, written), BatchChanges::MATRICES);
        written
    }

    /// Write consecutive colors starting at `start`
    ///
    /// Returns how many were written; zero when colors are disabled.
    pub fn set_colors(&mut self, colors: &[Color], start: usize) -> usize {
        if !self.enable_colors {
            log::trace!("Ignoring {} color writes: pool has no colors", colors.len());
            return 0;
        }

        let written = self.writable_len(start, colors.len());
        for (i, color) in colors[..written].iter().enumerate() {
            let address = self.router.to_batch(start + i);
            self.batches[address.batch].set_color_at(address.offset, color);
        }

        self.dirty.mark_range(self.router.batches_spanning(start, written), BatchChanges::COLORS);
        written
    }

    /// Move one instance to the parked transform
    pub fn park(&mut self, index: usize) -> bool {
        let parked = *self.allocator.park_matrix();
        self.set_transform(index, &parked)
    }

    /// Park `len` consecutive instances starting at `start`
    pub fn park_range(&mut self, start: usize, len: usize) -> usize {
        let written = self.writable_len(start, len);
        let parked = *self.allocator.park_matrix();
        for index in start..start + written {
            let address = self.router.to_batch(index);
            self.batches[address.batch].set_matrix_at(address.offset, &parked);
        }

        self.dirty.mark_range(self.router.batches_spanning(start, written), BatchChanges::MATRICES);
        written
    }

    /// Draw only the first `count` logical instances
    ///
    /// Counts above `max_instances` are clamped. Does not dirty any batch;
    /// call [`compute_bounds`](Self::compute_bounds) if bounds must follow.
    pub fn set_active_count(&mut self, count: usize) {
        if count > self.max_instances {
            log::debug!("Clamping active count {} to {}", count, self.max_instances);
        }
        self.active_count = count.min(self.max_instances);
        self.apply_active_count();
    }

    /// Reconcile every dirty batch with the host
    ///
    /// Flags changed buffers for upload and, when bounds are enabled,
    /// recomputes each dirty batch's bounding volume. A flush with nothing
    /// dirty does no work.
    pub fn flush(&mut self) -> FlushReport {
        self.stats.flushes += 1;
        let drained = self.dirty.drain_dirty();
        if drained.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport::default();
        for (batch, changes) in drained {
            let Some(drawable) = self.batches.get_mut(batch) else {
                continue;
            };

            if changes.contains(BatchChanges::MATRICES) {
                drawable.mark_matrices_changed();
                self.stats.matrix_uploads += 1;
            }
            if changes.contains(BatchChanges::COLORS) {
                drawable.mark_colors_changed();
                self.stats.color_uploads += 1;
            }
            if self.enable_bounds {
                drawable.compute_bounding_volume();
                report.bounds_recomputed += 1;
            }
            report.batches += 1;
        }

        self.stats.batches_flushed += report.batches as u64;
        self.stats.bounds_recomputations += report.bounds_recomputed as u64;
        log::debug!(
            "Flushed {} batches of {} ({} bounds recomputed)",
            report.batches, self.shape, report.bounds_recomputed
        );
        report
    }

    /// Recompute the bounding volume of every batch, dirty or not
    ///
    /// Returns the number of batches recomputed.
    pub fn compute_bounds(&mut self) -> usize {
        for drawable in &mut self.batches {
            drawable.compute_bounding_volume();
        }
        self.stats.bounds_recomputations += self.batches.len() as u64;
        self.batches.len()
    }

    /// Change the logical capacity
    ///
    /// Growing appends parked batches; shrinking releases trailing batches
    /// and parks slots of retained batches that fall outside the new range.
    /// Transforms below the smaller of both capacities are preserved. The
    /// active count is clamped to the new capacity. Growing never raises it,
    /// so added slots stay undrawn until [`set_active_count`](Self::set_active_count).
    pub fn resize(&mut self, max_instances: usize) -> PoolResult<()> {
        if max_instances == self.max_instances {
            return Ok(());
        }

        let old_max = self.max_instances;
        let reallocation = self.allocator.reallocate(
            &mut self.backend,
            &self.shape,
            &mut self.batches,
            max_instances,
        )?;

        self.max_instances = max_instances;
        let fresh = self.fresh_batch_changes();
        self.dirty.truncate(self.batches.len());
        self.dirty.mark_range(reallocation.added, fresh);

        if max_instances < old_max {
            // Tail of the last retained batch still holds old instances
            let capacity = self.batches.len() * self.router.batch_size();
            let parked = *self.allocator.park_matrix();
            for index in max_instances..old_max.min(capacity) {
                let address = self.router.to_batch(index);
                self.batches[address.batch].set_matrix_at(address.offset, &parked);
                self.dirty.mark(address.batch, BatchChanges::MATRICES);
            }
        }

        self.active_count = self.active_count.min(max_instances);
        self.apply_active_count();

        log::info!(
            "Resized pool for {} from {} to {} instances ({} batches)",
            self.shape, old_max, max_instances, self.batches.len()
        );
        Ok(())
    }

    /// Rebuild every batch with a new batch size
    ///
    /// This is a breaking operation: every previously written transform and
    /// color is discarded and all slots start parked again. Logical capacity
    /// and active count are kept. On host failure the old batches are kept.
    pub fn rebuild_with_batch_size(&mut self, batch_size: usize) -> PoolResult<()> {
        validate(batch_size, self.park_distance)?;

        let allocator = BatchAllocator::new(batch_size, self.park_distance, self.enable_colors);
        let mut batches = Vec::new();
        allocator.reallocate(&mut self.backend, &self.shape, &mut batches, self.max_instances)?;

        log::warn!(
            "Rebuilding pool for {} with batch size {} (was {}); all instance data discarded",
            self.shape, batch_size, self.router.batch_size()
        );

        let mut old_batches = std::mem::replace(&mut self.batches, batches);
        self.allocator.release_all(&mut self.backend, &mut old_batches);

        self.allocator = allocator;
        self.router = IndexRouter::new(batch_size);
        let fresh = self.fresh_batch_changes();
        self.dirty.clear();
        self.dirty.mark_range(0..self.batches.len(), fresh);
        self.apply_active_count();
        Ok(())
    }

    /// Transform of one instance, `None` when out of range
    pub fn transform(&self, index: usize) -> Option<Mat4> {
        let address = self.router.route(index, self.max_instances)?;
        Some(self.batches[address.batch].matrix_at(address.offset))
    }

    /// Color of one instance, `None` when out of range or colors are disabled
    pub fn color(&self, index: usize) -> Option<Color> {
        let address = self.router.route(index, self.max_instances)?;
        self.batches[address.batch].color_at(address.offset)
    }

    /// Drawn slot count of every batch, in batch order
    pub fn active_counts(&self) -> Vec<usize> {
        self.batches.iter().map(InstancedDrawable::count).collect()
    }

    /// Drawn slot count of one batch
    pub fn batch_active_count(&self, batch: usize) -> Option<usize> {
        self.batches.get(batch).map(InstancedDrawable::count)
    }

    /// Last computed bounding volume of one batch
    pub fn batch_bounds(&self, batch: usize) -> Option<Aabb> {
        self.batches.get(batch)?.bounding_volume()
    }

    /// Batches whose last computed bounds a ray enters, nearest first
    ///
    /// Yields `(batch, distance)` pairs. Batches without bounds or with
    /// nothing drawn are never hit.
    pub fn raycast_batches(&self, origin: Vec3, direction: Vec3) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self
            .batches
            .iter()
            .enumerate()
            .filter(|(_, drawable)| drawable.count() > 0)
            .filter_map(|(batch, drawable)| {
                let distance = drawable.bounding_volume()?.intersect_ray(origin, direction)?;
                Some((batch, distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }

    /// Flush state of one batch
    pub fn batch_state(&self, batch: usize) -> BatchState {
        self.dirty.state(batch)
    }

    /// Dirty batch indices in ascending order
    pub fn dirty_batches(&self) -> Vec<usize> {
        self.dirty.dirty_batches()
    }

    /// Buffers of one batch awaiting the next flush
    pub fn dirty_changes(&self, batch: usize) -> BatchChanges {
        self.dirty.changes(batch)
    }

    /// Host drawables, in batch order
    pub fn batches(&self) -> &[B::Drawable] {
        &self.batches
    }

    /// The host backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shape every batch renders
    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    /// Number of allocated batches
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Slots per batch
    pub fn batch_size(&self) -> usize {
        self.router.batch_size()
    }

    /// Logical capacity
    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    /// Logical slots currently drawn
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Whether per-instance colors are maintained
    pub fn colors_enabled(&self) -> bool {
        self.enable_colors
    }

    /// Whether flush recomputes bounding volumes
    pub fn bounds_enabled(&self) -> bool {
        self.enable_bounds
    }

    /// Current construction parameters
    pub fn config(&self) -> PoolConfig {
        PoolConfig {
            batch_size: self.router.batch_size(),
            max_instances: self.max_instances,
            enable_colors: self.enable_colors,
            enable_bounds: self.enable_bounds,
            park_distance: self.park_distance,
        }
    }

    /// Snapshot of pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            batch_count: self.batches.len(),
            max_instances: self.max_instances,
            active_count: self.active_count,
            ..self.stats.clone()
        }
    }

    fn apply_active_count(&mut self) {
        for (batch, drawable) in self.batches.iter_mut().enumerate() {
            drawable.set_count(self.router.active_in_batch(batch, self.active_count));
        }
    }

    fn writable_len(&self, start: usize, len: usize) -> usize {
        let written = len.min(self.max_instances.saturating_sub(start));
        if written < len {
            log::debug!(
                "Dropping {} of {} writes starting at {} (max {})",
                len - written, len, start, self.max_instances
            );
        }
        written
    }

    fn fresh_batch_changes(&self) -> BatchChanges {
        if self.enable_colors {
            BatchChanges::MATRICES | BatchChanges::COLORS
        } else {
            BatchChanges::MATRICES
        }
    }
}

impl<B: InstanceBackend> Drop for BatchedInstancePool<B> {
    fn drop(&mut self) {
        let count = self.batches.len();
        self.allocator.release_all(&mut self.backend, &mut self.batches);
        log::info!("Released instance pool for {} ({} batches)", self.shape, count);
    }
}

impl<B: InstanceBackend> std::fmt::Debug for BatchedInstancePool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedInstancePool")
            .field("shape", &self.shape.name)
            .field("batch_size", &self.router.batch_size())
            .field("batch_count", &self.batches.len())
            .field("max_instances", &self.max_instances)
            .field("active_count", &self.active_count)
            .field("dirty_batches", &self.dirty.len())
            .finish()
    }
}

fn validate(batch_size: usize, park_distance: f32) -> PoolResult<()> {
    if batch_size == 0 {
        return Err(PoolError::InvalidBatchSize);
    }
    if !park_distance.is_finite() || park_distance < FAR_DISTANCE_THRESHOLD {
        return Err(PoolError::ParkDistanceTooSmall {
            distance: park_distance,
            minimum: FAR_DISTANCE_THRESHOLD,
        });
    }
    Ok(())
}
