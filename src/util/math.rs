//! Math type re-exports and transform helpers.
//!
//! Re-exports the `glam` types used across the crate and provides the
//! model-matrix composition shared by the raster preview, the flattening
//! pipeline and the analytic primitive lists.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use std::fmt;

/// Compose `translate(position) * rotate(rotation) * scale(scale)`.
///
/// `rotation_deg` holds Euler angles in degrees, applied X first, then Y,
/// then Z (`R = Rz * Ry * Rx`).
pub fn compose_model_matrix(position: Vec3, rotation_deg: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(position) * rotation_matrix(rotation_deg) * Mat4::from_scale(scale)
}

/// Rotation part of [`compose_model_matrix`].
pub fn rotation_matrix(rotation_deg: Vec3) -> Mat4 {
    let r = rotation_deg * (std::f32::consts::PI / 180.0);
    Mat4::from_rotation_z(r.z) * Mat4::from_rotation_y(r.y) * Mat4::from_rotation_x(r.x)
}

/// Normal transform of the upper 3x3: the cofactor matrix, which is the
/// inverse-transpose scaled by the determinant.
///
/// Keeps normals perpendicular to surfaces under non-uniform scale. Results
/// must be re-normalized. The cofactor stays defined when one axis is scaled
/// to zero, so a flattened plane keeps its normal. Mirroring transforms are
/// sign-corrected to match the inverse-transpose.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    let m = Mat3::from_mat4(*model);
    let cofactor = Mat3::from_cols(
        m.y_axis.cross(m.z_axis),
        m.z_axis.cross(m.x_axis),
        m.x_axis.cross(m.y_axis),
    );
    if m.determinant() < 0.0 {
        cofactor * -1.0
    } else {
        cofactor
    }
}

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around the center.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_by_point(m.transform_point3(corner));
        }
        out
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn test_bbox3f() {
        let mut b = BBox3f::EMPTY;
        assert!(b.is_empty());

        b.expand_by_point(Vec3::ZERO);
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::ZERO);

        b.expand_by_point(Vec3::ONE);
        assert_eq!(b.center(), Vec3::splat(0.5));
        assert_eq!(b.size(), Vec3::ONE);
    }

    #[test]
    fn test_model_matrix_order() {
        // Scale first, then rotate 90 degrees about Y, then translate.
        let m = compose_model_matrix(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 90.0, 0.0),
            Vec3::new(2.0, 1.0, 1.0),
        );
        let p = m.transform_point3(Vec3::X);
        assert!(approx(p, Vec3::new(10.0, 0.0, -2.0)), "got {p:?}");
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        // Slanted plane x + y = 0 squashed along y: normal must stay perpendicular.
        let model = Mat4::from_scale(Vec3::new(1.0, 4.0, 1.0));
        let n = (normal_matrix(&model) * Vec3::new(1.0, 1.0, 0.0)).normalize();
        let tangent = model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(tangent).abs() < 1e-5);
    }

    #[test]
    fn test_normal_matrix_matches_inverse_transpose() {
        let model = compose_model_matrix(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(20.0, -35.0, 50.0),
            Vec3::new(0.5, 2.0, 3.0),
        );
        let expected = Mat3::from_mat4(model).inverse().transpose();
        for v in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, -2.0, 0.5)] {
            let a = (normal_matrix(&model) * v).normalize();
            let b = (expected * v).normalize();
            assert!(approx(a, b), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_normal_matrix_tiny_scale() {
        let model = Mat4::from_scale(Vec3::splat(0.004));
        let n = (normal_matrix(&model) * Vec3::Y).normalize_or_zero();
        assert!(approx(n, Vec3::Y), "got {n:?}");
    }

    #[test]
    fn test_normal_matrix_zero_axis() {
        // A plane squashed to zero height still faces up
        let model = Mat4::from_scale(Vec3::new(3.0, 0.0, 3.0));
        let n = (normal_matrix(&model) * Vec3::Y).normalize_or_zero();
        assert!(approx(n, Vec3::Y), "got {n:?}");
    }

    #[test]
    fn test_normal_matrix_mirror_keeps_orientation() {
        let model = Mat4::from_scale(Vec3::new(-1.0, 2.0, 1.0));
        let n = (normal_matrix(&model) * Vec3::X).normalize();
        assert!(approx(n, Vec3::NEG_X), "got {n:?}");
    }

    #[test]
    fn test_bbox_transformed() {
        let b = BBox3f::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = b.transformed(&Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        assert!(approx(t.center(), Vec3::new(0.0, 5.0, 0.0)));
        assert!(approx(t.size(), Vec3::splat(2.0)));
    }
}
