//! CPU reference backend
//!
//! Keeps every drawable's buffers in host memory, laid out exactly as they
//! would be uploaded: one contiguous column-major `[f32; 16]` per slot for
//! transforms and `[f32; 3]` per slot for colors. Upload flags are modeled
//! as version counters, which makes the backend useful for tests and for
//! headless tools that consume the buffers directly.

use crate::error::{PoolError, PoolResult};
use crate::foundation::bounds::Aabb;
use crate::foundation::math::{Color, Mat4};
use crate::pool::backend::{InstanceBackend, InstancedDrawable, ShapeDescriptor};

/// In-memory instanced drawable
#[derive(Debug, Clone)]
pub struct CpuDrawable {
    shape_bounds: Aabb,
    matrices: Vec<[f32; 16]>,
    colors: Option<Vec<[f32; 3]>>,
    count: usize,
    matrix_version: u64,
    color_version: u64,
    bounds: Option<Aabb>,
    bounds_computations: u64,
}

impl CpuDrawable {
    fn new(shape: &ShapeDescriptor, capacity: usize, with_colors: bool) -> Self {
        let mut identity = [0.0; 16];
        identity.copy_from_slice(Mat4::identity().as_slice());

        Self {
            shape_bounds: shape.local_bounds,
            matrices: vec![identity; capacity],
            colors: with_colors.then(|| vec![[1.0; 3]; capacity]),
            count: capacity,
            matrix_version: 0,
            color_version: 0,
            bounds: None,
            bounds_computations: 0,
        }
    }

    /// Transform buffer as uploaded to the GPU
    pub fn matrix_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    /// Color buffer as uploaded to the GPU
    pub fn color_bytes(&self) -> Option<&[u8]> {
        self.colors.as_deref().map(|colors| bytemuck::cast_slice(colors))
    }

    /// Times the transform buffer was flagged for upload
    pub fn matrix_version(&self) -> u64 {
        self.matrix_version
    }

    /// Times the color buffer was flagged for upload
    pub fn color_version(&self) -> u64 {
        self.color_version
    }

    /// Times the bounding volume was recomputed
    pub fn bounds_computations(&self) -> u64 {
        self.bounds_computations
    }
}

impl InstancedDrawable for CpuDrawable {
    fn capacity(&self) -> usize {
        self.matrices.len()
    }

    fn set_matrix_at(&mut self, slot: usize, matrix: &Mat4) {
        if let Some(target) = self.matrices.get_mut(slot) {
            target.copy_from_slice(matrix.as_slice());
        }
    }

    fn matrix_at(&self, slot: usize) -> Mat4 {
        self.matrices
            .get(slot)
            .map_or_else(Mat4::identity, |m| Mat4::from_column_slice(m))
    }

    fn set_color_at(&mut self, slot: usize, color: &Color) {
        if let Some(target) = self.colors.as_mut().and_then(|colors| colors.get_mut(slot)) {
            *target = [color.x, color.y, color.z];
        }
    }

    fn color_at(&self, slot: usize) -> Option<Color> {
        let [r, g, b] = *self.colors.as_ref()?.get(slot)?;
        Some(Color::new(r, g, b))
    }

    fn set_count(&mut self, count: usize) {
        self.count = count.min(self.capacity());
    }

    fn count(&self) -> usize {
        self.count
    }

    fn mark_matrices_changed(&mut self) {
        self.matrix_version += 1;
    }

    fn mark_colors_changed(&mut self) {
        if self.colors.is_some() {
            self.color_version += 1;
        }
    }

    fn compute_bounding_volume(&mut self) {
        self.bounds_computations += 1;
        self.bounds = self.matrices[..self.count]
            .iter()
            .map(|m| self.shape_bounds.transformed(&Mat4::from_column_slice(m)))
            .reduce(|acc, aabb| acc.union(&aabb));
    }

    fn bounding_volume(&self) -> Option<Aabb> {
        self.bounds
    }
}

/// Backend producing [`CpuDrawable`]s
#[derive(Debug, Default)]
pub struct CpuBackend {
    allocation_limit: Option<usize>,
    live: usize,
    created: u64,
    released: u64,
}

impl CpuBackend {
    /// Create an unbounded backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that refuses to hold more than `limit` live drawables,
    /// emulating a host that runs out of buffer memory
    pub fn with_allocation_limit(limit: usize) -> Self {
        Self {
            allocation_limit: Some(limit),
            ..Default::default()
        }
    }

    /// Drawables currently alive
    pub fn live_drawables(&self) -> usize {
        self.live
    }

    /// Drawables created since construction
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Drawables released since construction
    pub fn released(&self) -> u64 {
        self.released
    }
}

impl InstanceBackend for CpuBackend {
    type Drawable = CpuDrawable;

    fn create_drawable(
        &mut self,
        shape: &ShapeDescriptor,
        capacity: usize,
        with_colors: bool,
    ) -> PoolResult<CpuDrawable> {
        if let Some(limit) = self.allocation_limit.filter(|limit| self.live >= *limit) {
            return Err(PoolError::BackendAllocation {
                batch: self.live,
                reason: format!("allocation limit of {} drawables reached", limit),
            });
        }

        self.live += 1;
        self.created += 1;
        log::trace!("Created CPU drawable for {} with {} slots", shape, capacity);
        Ok(CpuDrawable::new(shape, capacity, with_colors))
    }

    fn release_drawable(&mut self, drawable: CpuDrawable) {
        self.live = self.live.saturating_sub(1);
        self.released += 1;
        log::trace!("Released CPU drawable with {} slots", drawable.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_matrix_round_trip_and_bytes() {
        let mut backend = CpuBackend::new();
        let mut drawable = backend
            .create_drawable(&ShapeDescriptor::unit_cube(), 4, false)
            .unwrap();
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));

        drawable.set_matrix_at(2, &matrix);

        assert_relative_eq!(drawable.matrix_at(2), matrix);
        assert_eq!(drawable.matrix_bytes().len(), 4 * 16 * std::mem::size_of::<f32>());
        assert!(drawable.color_bytes().is_none());
        assert!(drawable.color_at(2).is_none());
    }

    #[test]
    fn test_colors_only_when_enabled() {
        let mut backend = CpuBackend::new();
        let mut drawable = backend
            .create_drawable(&ShapeDescriptor::unit_cube(), 2, true)
            .unwrap();

        drawable.set_color_at(1, &Color::new(0.25, 0.5, 0.75));
        drawable.mark_colors_changed();

        assert_eq!(drawable.color_at(1), Some(Color::new(0.25, 0.5, 0.75)));
        assert_eq!(drawable.color_version(), 1);
        assert_eq!(drawable.color_bytes().map(<[u8]>::len), Some(2 * 3 * 4));
    }

    #[test]
    fn test_bounds_cover_drawn_slots_only() {
        let mut backend = CpuBackend::new();
        let mut drawable = backend
            .create_drawable(&ShapeDescriptor::unit_cube(), 3, false)
            .unwrap();
        drawable.set_matrix_at(0, &Mat4::new_translation(&Vec3::new(-4.0, 0.0, 0.0)));
        drawable.set_matrix_at(1, &Mat4::new_translation(&Vec3::new(4.0, 0.0, 0.0)));
        drawable.set_matrix_at(2, &Mat4::new_translation(&Vec3::new(500.0, 0.0, 0.0)));
        drawable.set_count(2);

        drawable.compute_bounding_volume();
        let bounds = drawable.bounding_volume().unwrap();

        assert_relative_eq!(bounds.min, Vec3::new(-4.5, -0.5, -0.5));
        assert_relative_eq!(bounds.max, Vec3::new(4.5, 0.5, 0.5));
        assert_eq!(drawable.bounds_computations(), 1);

        drawable.set_count(0);
        drawable.compute_bounding_volume();
        assert!(drawable.bounding_volume().is_none());
    }

    #[test]
    fn test_allocation_limit() {
        let mut backend = CpuBackend::with_allocation_limit(1);
        let first = backend.create_drawable(&ShapeDescriptor::unit_cube(), 1, false).unwrap();
        assert!(matches!(
            backend.create_drawable(&ShapeDescriptor::unit_cube(), 1, false),
            Err(PoolError::BackendAllocation { .. })
        ));

        backend.release_drawable(first);
        assert_eq!(backend.live_drawables(), 0);
        assert!(backend.create_drawable(&ShapeDescriptor::unit_cube(), 1, false).is_ok());
    }
}
