//! 2×3 affine transforms used by the face, body and muscle stabilizers.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use super::point::LandmarkPoint;

/// Affine transform in the standard 2×3 layout:
///
/// ```text
/// x' = scale_x * x + skew_x  * y + translate_x
/// y' = skew_y  * x + scale_y * y + translate_y
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentMatrix {
    pub scale_x: f64,
    pub skew_x: f64,
    pub translate_x: f64,
    pub skew_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl Default for AlignmentMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AlignmentMatrix {
    pub const IDENTITY: AlignmentMatrix = AlignmentMatrix {
        scale_x: 1.0,
        skew_x: 0.0,
        translate_x: 0.0,
        skew_y: 0.0,
        scale_y: 1.0,
        translate_y: 0.0,
    };

    pub const fn new(
        scale_x: f64,
        skew_x: f64,
        translate_x: f64,
        skew_y: f64,
        scale_y: f64,
        translate_y: f64,
    ) -> Self {
        Self {
            scale_x,
            skew_x,
            translate_x,
            skew_y,
            scale_y,
            translate_y,
        }
    }

    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, tx, 0.0, 1.0, ty)
    }

    /// Rotation by `angle` radians about `pivot`.
    pub fn rotation_about(angle: f64, pivot: LandmarkPoint) -> Self {
        Self::similarity_about(angle, 1.0, pivot)
    }

    /// Uniform scaling by `scale` about `pivot`.
    pub fn scaling_about(scale: f64, pivot: LandmarkPoint) -> Self {
        Self::similarity_about(0.0, scale, pivot)
    }

    /// Rotation + uniform scale about `pivot` (the pivot is a fixed point).
    pub fn similarity_about(angle: f64, scale: f64, pivot: LandmarkPoint) -> Self {
        Self::similarity_mapping(angle, scale, pivot, pivot)
    }

    /// Rotation + uniform scale whose translation maps `from` exactly onto `to`.
    pub fn similarity_mapping(
        angle: f64,
        scale: f64,
        from: LandmarkPoint,
        to: LandmarkPoint,
    ) -> Self {
        let (sin, cos) = angle.sin_cos();
        let a = scale * cos;
        let b = scale * sin;
        Self::new(
            a,
            -b,
            to.x - (a * from.x - b * from.y),
            b,
            a,
            to.y - (b * from.x + a * from.y),
        )
    }

    /// Map a point; `z` is passed through.
    pub fn apply(&self, p: &LandmarkPoint) -> LandmarkPoint {
        LandmarkPoint::with_z(
            self.scale_x * p.x + self.skew_x * p.y + self.translate_x,
            self.skew_y * p.x + self.scale_y * p.y + self.translate_y,
            p.z,
        )
    }

    /// Composition: apply `self` first, then `next`.
    pub fn then(&self, next: &AlignmentMatrix) -> AlignmentMatrix {
        Self::from_matrix3(&(next.to_matrix3() * self.to_matrix3()))
    }

    pub fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.skew_x * self.skew_y
    }

    pub fn inverse(&self) -> Option<AlignmentMatrix> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let a = self.scale_y / det;
        let b = -self.skew_x / det;
        let d = -self.skew_y / det;
        let e = self.scale_x / det;
        Some(Self::new(
            a,
            b,
            -(a * self.translate_x + b * self.translate_y),
            d,
            e,
            -(d * self.translate_x + e * self.translate_y),
        ))
    }

    /// Rotation angle (radians) of the linear part, assuming a similarity.
    pub fn rotation(&self) -> f64 {
        self.skew_y.atan2(self.scale_x)
    }

    /// Uniform scale of the linear part, assuming a similarity.
    pub fn uniform_scale(&self) -> f64 {
        self.scale_x.hypot(self.skew_y)
    }

    pub fn translate_by(&self, dx: f64, dy: f64) -> AlignmentMatrix {
        AlignmentMatrix {
            translate_x: self.translate_x + dx,
            translate_y: self.translate_y + dy,
            ..*self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_row_major().iter().all(|v| v.is_finite())
    }

    pub fn to_matrix3(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.scale_x,
            self.skew_x,
            self.translate_x,
            self.skew_y,
            self.scale_y,
            self.translate_y,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Take the affine part of `m` (the last row is ignored).
    pub fn from_matrix3(m: &Matrix3<f64>) -> AlignmentMatrix {
        Self::new(
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
        )
    }

    pub fn to_row_major(&self) -> [f64; 6] {
        [
            self.scale_x,
            self.skew_x,
            self.translate_x,
            self.skew_y,
            self.scale_y,
            self.translate_y,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rotation_about_keeps_pivot_fixed() {
        let pivot = LandmarkPoint::new(10.0, 20.0);
        let m = AlignmentMatrix::rotation_about(FRAC_PI_2, pivot);
        let p = m.apply(&pivot);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 20.0, epsilon = 1e-12);

        let q = m.apply(&LandmarkPoint::new(11.0, 20.0));
        assert_relative_eq!(q.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(q.y, 21.0, epsilon = 1e-12);
    }

    #[test]
    fn then_applies_left_to_right() {
        let shift = AlignmentMatrix::translation(5.0, 0.0);
        let double = AlignmentMatrix::scaling_about(2.0, LandmarkPoint::new(0.0, 0.0));
        let p = LandmarkPoint::new(1.0, 1.0);

        let q = shift.then(&double).apply(&p);
        assert_relative_eq!(q.x, 12.0);
        assert_relative_eq!(q.y, 2.0);

        let r = double.then(&shift).apply(&p);
        assert_relative_eq!(r.x, 7.0);
        assert_relative_eq!(r.y, 2.0);
    }

    #[test]
    fn inverse_roundtrip() {
        let m = AlignmentMatrix::similarity_mapping(
            0.3,
            1.7,
            LandmarkPoint::new(40.0, 60.0),
            LandmarkPoint::new(500.0, 380.0),
        );
        let inv = m.inverse().unwrap();
        let p = LandmarkPoint::new(123.0, -45.0);
        let back = inv.apply(&m.apply(&p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
        assert_relative_eq!(m.rotation(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(m.uniform_scale(), 1.7, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = AlignmentMatrix::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        assert!(m.inverse().is_none());
    }
}
