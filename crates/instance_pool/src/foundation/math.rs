//! Math utilities and types
//!
//! Provides the math types used for instance transforms and colors, plus the
//! constants that define where inactive slots are parked.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Linear RGB color, one float per channel
pub type Color = Vec3;

/// Translations at or beyond this magnitude are considered outside the
/// working volume of any scene the pool serves.
pub const FAR_DISTANCE_THRESHOLD: f32 = 10_000.0;

/// Default distance (per axis) at which inactive slots are parked
pub const DEFAULT_PARK_DISTANCE: f32 = 100_000.0;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position, rotation and scale
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

impl From<Transform> for Mat4 {
    fn from(transform: Transform) -> Self {
        transform.to_matrix()
    }
}

impl From<&Transform> for Mat4 {
    fn from(transform: &Transform) -> Self {
        transform.to_matrix()
    }
}

/// Translation column of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Matrix that places a slot `distance` units out along every axis
///
/// The resulting translation magnitude is `distance * sqrt(3)`, so any
/// `distance >= FAR_DISTANCE_THRESHOLD` keeps the slot out of culling and
/// ray queries of the working volume.
pub fn parked_matrix(distance: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::repeat(distance))
}

/// Whether a matrix places its instance beyond the far threshold
pub fn is_parked(matrix: &Mat4) -> bool {
    translation_of(matrix).magnitude() >= FAR_DISTANCE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_to_matrix_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let matrix = transform.to_matrix();

        assert_relative_eq!(translation_of(&matrix), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(matrix.m44, 1.0);
    }

    #[test]
    fn test_transform_scale_and_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let transform = Transform::new(Vec3::zeros(), rotation, Vec3::repeat(2.0));
        let moved = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(moved, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_parked_matrix_is_far() {
        let parked = parked_matrix(DEFAULT_PARK_DISTANCE);
        assert!(is_parked(&parked));
        assert!(translation_of(&parked).magnitude() >= FAR_DISTANCE_THRESHOLD);
        assert!(!is_parked(&Mat4::identity()));
    }
}
