//! Axis-aligned bounding volumes
//!
//! Batches that take part in culling or hit-testing carry an `Aabb` over the
//! world-space extent of their drawn instances.

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Unit cube centered on the origin
    pub fn unit() -> Self {
        Self::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5))
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Smallest AABB enclosing both boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// World-space AABB of this box after applying `matrix`
    ///
    /// Transforms all eight corners, so rotated boxes stay conservative.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut min = Vec3::repeat(f32::INFINITY);
        let mut max = Vec3::repeat(f32::NEG_INFINITY);

        for corner in 0..8 {
            let local = Point3::new(
                if corner & 1 != 0 { self.max.x } else { self.min.x },
                if corner & 2 != 0 { self.max.y } else { self.min.y },
                if corner & 4 != 0 { self.max.z } else { self.min.z },
            );
            let world = matrix.transform_point(&local).coords;
            min = min.inf(&world);
            max = max.sup(&world);
        }

        Aabb { min, max }
    }

    /// Distance along `direction` at which a ray from `origin` enters the box
    ///
    /// Slab test per axis. A ray starting inside the box hits at `0.0`.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut near = f32::NEG_INFINITY;
        let mut far = f32::INFINITY;

        for axis in 0..3 {
            let inv = direction[axis].recip();
            let a = (self.min[axis] - origin[axis]) * inv;
            let b = (self.max[axis] - origin[axis]) * inv;
            near = near.max(a.min(b));
            far = far.min(a.max(b));
        }

        (far >= near && far >= 0.0).then(|| near.max(0.0))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_union_encloses_both() {
        let a = Aabb::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0));
        let b = Aabb::new(Vec3::new(2.0, -3.0, 0.5), Vec3::new(4.0, 0.0, 2.0));
        let merged = a.union(&b);

        assert_relative_eq!(merged.min, Vec3::new(-1.0, -3.0, 0.0));
        assert_relative_eq!(merged.max, Vec3::new(4.0, 1.0, 2.0));
    }

    #[test]
    fn test_transformed_by_translation_and_scale() {
        let matrix = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0))
            * Mat4::new_scaling(2.0);
        let moved = Aabb::unit().transformed(&matrix);

        assert_relative_eq!(moved.min, Vec3::new(9.0, -1.0, -1.0));
        assert_relative_eq!(moved.max, Vec3::new(11.0, 1.0, 1.0));
        assert!(moved.contains_point(Vec3::new(10.5, 0.0, 0.0)));
    }

    #[test]
    fn test_ray_hits_and_misses() {
        let aabb = Aabb::unit();
        let hit = aabb.intersect_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(hit.unwrap(), 4.5);

        let miss = aabb.intersect_ray(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(miss.is_none());
    }
}
