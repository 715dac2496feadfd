//! 3×3 projective transforms used by the landscape stabilizer.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::affine::AlignmentMatrix;
use super::point::LandmarkPoint;

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPS: f64 = 1e-10;

/// Row-major 3×3 homography: `[u, v, w]^T = H * [x, y, 1]^T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomographyMatrix {
    pub rows: [[f64; 3]; 3],
}

impl Default for HomographyMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl HomographyMatrix {
    pub const IDENTITY: HomographyMatrix = HomographyMatrix {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub const fn new(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    pub fn from_matrix3(m: &Matrix3<f64>) -> Self {
        Self {
            rows: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
        }
    }

    pub fn to_matrix3(&self) -> Matrix3<f64> {
        let r = &self.rows;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        )
    }

    pub fn from_affine(m: &AlignmentMatrix) -> Self {
        Self::from_matrix3(&m.to_matrix3())
    }

    pub fn determinant(&self) -> f64 {
        self.to_matrix3().determinant()
    }

    /// Finite entries and a non-singular matrix.
    pub fn is_valid(&self) -> bool {
        let finite = self.rows.iter().flatten().all(|v| v.is_finite());
        finite && self.determinant().abs() > SINGULAR_EPS
    }

    /// Scale so that `h22 == 1` (no-op when `h22` is ~0).
    pub fn normalized(&self) -> Self {
        let s = self.rows[2][2];
        if s.abs() < 1e-15 {
            return *self;
        }
        let mut rows = self.rows;
        rows.iter_mut().flatten().for_each(|v| *v /= s);
        Self { rows }
    }

    /// Project a point; `None` when it maps to the line at infinity.
    pub fn project(&self, p: &LandmarkPoint) -> Option<LandmarkPoint> {
        let q = self.to_matrix3() * Vector3::new(p.x, p.y, 1.0);
        if q[2].abs() < 1e-15 {
            return None;
        }
        Some(LandmarkPoint::with_z(q[0] / q[2], q[1] / q[2], p.z))
    }

    /// Composition: apply `self` first, then `next`.
    pub fn then(&self, next: &HomographyMatrix) -> HomographyMatrix {
        Self::from_matrix3(&(next.to_matrix3() * self.to_matrix3())).normalized()
    }

    pub fn inverse(&self) -> Option<HomographyMatrix> {
        self.to_matrix3()
            .try_inverse()
            .map(|m| Self::from_matrix3(&m).normalized())
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let r = &self.rows;
        [
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn perspective() -> HomographyMatrix {
        HomographyMatrix::new([[1.1, 0.05, 12.0], [-0.02, 0.95, -7.0], [1e-4, -5e-5, 1.0]])
    }

    #[test]
    fn identity_is_valid_with_unit_determinant() {
        assert!(HomographyMatrix::IDENTITY.is_valid());
        assert_relative_eq!(HomographyMatrix::IDENTITY.determinant(), 1.0);
    }

    #[test]
    fn singular_matrix_is_invalid() {
        let h = HomographyMatrix::new([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert!(!h.is_valid());
        let nan = HomographyMatrix::new([[f64::NAN, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(!nan.is_valid());
    }

    #[test]
    fn project_through_inverse_returns_point() {
        let h = perspective();
        let inv = h.inverse().unwrap();
        let p = LandmarkPoint::new(320.0, 240.0);
        let back = inv.project(&h.project(&p).unwrap()).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-8);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-8);
    }

    #[test]
    fn affine_embedding_matches_affine_apply() {
        let a = AlignmentMatrix::similarity_about(0.2, 1.3, LandmarkPoint::new(50.0, 50.0));
        let h = HomographyMatrix::from_affine(&a);
        let p = LandmarkPoint::new(7.0, 91.0);
        let q = h.project(&p).unwrap();
        let r = a.apply(&p);
        assert_relative_eq!(q.x, r.x, epsilon = 1e-12);
        assert_relative_eq!(q.y, r.y, epsilon = 1e-12);
    }
}
