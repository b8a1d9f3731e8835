//! Backend abstraction traits for the instance pool
//!
//! The pool never touches GPU resources itself. A host renderer provides
//! fixed-capacity instanced drawables through these traits, and the pool
//! drives them: slot writes, visible counts, upload flags and bounds.

use crate::error::PoolResult;
use crate::foundation::bounds::Aabb;
use crate::foundation::math::{Color, Mat4};

/// Shape every drawable of a pool renders
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDescriptor {
    /// Human-readable name, used in logs
    pub name: String,
    /// Object-space bounds of the shape
    pub local_bounds: Aabb,
}

impl ShapeDescriptor {
    /// Create a shape description
    pub fn new(name: impl Into<String>, local_bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            local_bounds,
        }
    }

    /// Unit cube centered on the origin
    pub fn unit_cube() -> Self {
        Self::new("unit_cube", Aabb::unit())
    }
}

impl std::fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One fixed-capacity instanced drawable owned by the host renderer
pub trait InstancedDrawable {
    /// Number of physical slots
    fn capacity(&self) -> usize;

    /// Write the transform of `slot`
    fn set_matrix_at(&mut self, slot: usize, matrix: &Mat4);

    /// Read the transform of `slot`
    fn matrix_at(&self, slot: usize) -> Mat4;

    /// Write the color of `slot`. Ignored by drawables built without colors.
    fn set_color_at(&mut self, slot: usize, color: &Color);

    /// Read the color of `slot`, `None` for drawables built without colors
    fn color_at(&self, slot: usize) -> Option<Color>;

    /// Set how many leading slots are drawn
    fn set_count(&mut self, count: usize);

    /// How many leading slots are drawn
    fn count(&self) -> usize;

    /// Flag the transform buffer for re-upload
    fn mark_matrices_changed(&mut self);

    /// Flag the color buffer for re-upload
    fn mark_colors_changed(&mut self);

    /// Recompute the bounding volume over the drawn slots
    fn compute_bounding_volume(&mut self);

    /// Last computed bounding volume, `None` when never computed or empty
    fn bounding_volume(&self) -> Option<Aabb>;
}

/// Factory and owner of drawables
pub trait InstanceBackend {
    /// Drawable type produced by this backend
    type Drawable: InstancedDrawable;

    /// Construct a drawable with `capacity` slots for `shape`
    fn create_drawable(
        &mut self,
        shape: &ShapeDescriptor,
        capacity: usize,
        with_colors: bool,
    ) -> PoolResult<Self::Drawable>;

    /// Release the host resources behind a drawable
    fn release_drawable(&mut self, drawable: Self::Drawable);
}

impl<B: InstanceBackend + ?Sized> InstanceBackend for &mut B {
    type Drawable = B::Drawable;

    fn create_drawable(
        &mut self,
        shape: &ShapeDescriptor,
        capacity: usize,
        with_colors: bool,
    ) -> PoolResult<Self::Drawable> {
        (**self).create_drawable(shape, capacity, with_colors)
    }

    fn release_drawable(&mut self, drawable: Self::Drawable) {
        (**self).release_drawable(drawable);
    }
}
