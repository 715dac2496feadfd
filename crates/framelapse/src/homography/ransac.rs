//! Point-to-point homography estimation via DLT with Hartley normalization,
//! wrapped in a seeded RANSAC loop.

use std::cmp::Ordering;

use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers { needed: usize, found: usize },
}

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// ||project(H, src) - dst||.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    (dx * dx + dy * dy).sqrt()
}

/// Translate centroid to origin, scale so mean distance from origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, normalized)
}

/// Estimate H with dst ≈ project(H, src) from ≥4 correspondences.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len();
    if n < 4 || dst.len() < 4 {
        return Err(HomographyError::TooFewPoints {
            needed: 4,
            got: n.min(dst.len()),
        });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::NumericalFailure(
            "src and dst must have the same length".into(),
        ));
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // 2n × 9 system, two rows per correspondence
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // h is the eigenvector of the smallest eigenvalue of A^T A.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let min_idx = (0..9)
        .min_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .partial_cmp(&eig.eigenvalues[j].abs())
                .unwrap_or(Ordering::Equal)
        })
        .unwrap_or(0);
    let h_vec = eig.eigenvectors.column(min_idx);
    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2],
        h_vec[3], h_vec[4], h_vec[5],
        h_vec[6], h_vec[7], h_vec[8],
    );

    // H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    if !h.iter().all(|v| v.is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "non-finite homography".into(),
        ));
    }
    if scale.abs() < 1e-15 {
        Ok(h)
    } else {
        Ok(h / scale)
    }
}

/// RANSAC configuration for homography fitting.
#[derive(Debug, Clone)]
pub struct RansacHomographyConfig {
    pub max_iters: usize,
    /// Inlier threshold (reprojection error in pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 5.0,
            min_inliers: 4,
            seed: 0,
        }
    }
}

impl RansacHomographyConfig {
    pub fn with_threshold(inlier_threshold: f64) -> Self {
        Self {
            inlier_threshold,
            ..Self::default()
        }
    }
}

/// Result of RANSAC homography fitting.
#[derive(Debug, Clone)]
pub struct RansacHomographyResult {
    pub h: Matrix3<f64>,
    /// `true` for inliers, aligned with the input correspondences.
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    /// Reprojection error of every correspondence under `h`.
    pub errors: Vec<f64>,
}

impl RansacHomographyResult {
    /// Errors of the correspondences flagged as inliers.
    pub fn inlier_errors(&self) -> Vec<f64> {
        self.inlier_mask
            .iter()
            .zip(&self.errors)
            .filter_map(|(&inlier, &err)| inlier.then_some(err))
            .collect()
    }
}

/// Sample `k` distinct indices from `0..n` using Fisher–Yates partial shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// Fit `dst ≈ H(src)` robustly.
pub fn fit_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacHomographyConfig,
) -> Result<RansacHomographyResult, HomographyError> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return Err(HomographyError::TooFewPoints {
            needed: 4,
            got: n.min(dst.len()),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best_inliers = 0usize;
    let mut best_mask: Vec<bool> = vec![false; n];
    let mut best_h = Matrix3::identity();

    for _ in 0..config.max_iters {
        let sample = sample_indices(&mut rng, n, 4);
        let s4: Vec<[f64; 2]> = sample.iter().map(|&i| src[i]).collect();
        let d4: Vec<[f64; 2]> = sample.iter().map(|&i| dst[i]).collect();

        let h = match estimate_homography_dlt(&s4, &d4) {
            Ok(h) => h,
            Err(_) => continue,
        };

        let mask: Vec<bool> = src
            .iter()
            .zip(dst)
            .map(|(s, d)| reprojection_error(&h, s, d) < config.inlier_threshold)
            .collect();
        let count = mask.iter().filter(|&&m| m).count();

        if count > best_inliers {
            best_inliers = count;
            best_mask = mask;
            best_h = h;

            if count * 10 > n * 9 {
                break;
            }
        }
    }

    if best_inliers < config.min_inliers {
        return Err(HomographyError::InsufficientInliers {
            needed: config.min_inliers,
            found: best_inliers,
        });
    }

    let inlier_src: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
    let inlier_dst: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();
    let h_refit = estimate_homography_dlt(&inlier_src, &inlier_dst).unwrap_or(best_h);

    let errors: Vec<f64> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(&h_refit, s, d))
        .collect();
    let inlier_mask: Vec<bool> = errors.iter().map(|&e| e < config.inlier_threshold).collect();
    let n_inliers = inlier_mask.iter().filter(|&&m| m).count();

    tracing::trace!(
        n,
        n_inliers,
        threshold = config.inlier_threshold,
        "ransac homography fit"
    );

    Ok(RansacHomographyResult {
        h: h_refit,
        inlier_mask,
        n_inliers,
        errors,
    })
}

/// Mean and 95th percentile of `errors` (sorted in place); zeros when empty.
pub(crate) fn mean_and_p95(errors: &mut [f64]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let idx = ((errors.len() as f64 * 0.95) as usize).min(errors.len() - 1);
    (mean, errors[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_test_homography() -> Matrix3<f64> {
        #[rustfmt::skip]
        let h = Matrix3::new(
            1.05, 0.02, 12.0,
            -0.01, 0.98, -7.5,
            0.00002, -0.00001, 1.0,
        );
        h
    }

    fn grid(n: usize, step: f64) -> Vec<[f64; 2]> {
        (0..n * n)
            .map(|i| [(i % n) as f64 * step + 10.0, (i / n) as f64 * step + 15.0])
            .collect()
    }

    #[test]
    fn dlt_exact_4points() {
        let h_true = make_test_homography();
        let src = [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]];
        let dst: Vec<[f64; 2]> = src.iter().map(|s| project(&h_true, s[0], s[1])).collect();

        let h_est = estimate_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let err = reprojection_error(&h_est, s, d);
            assert!(err < 1e-6, "reprojection error too large: {err}");
        }
    }

    #[test]
    fn dlt_overdetermined_recovers_matrix() {
        let h_true = make_test_homography();
        let src = grid(5, 40.0);
        let dst: Vec<[f64; 2]> = src.iter().map(|s| project(&h_true, s[0], s[1])).collect();

        let h_est = estimate_homography_dlt(&src, &dst).unwrap();
        for (a, b) in h_est.iter().zip(h_true.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn ransac_rejects_outliers() {
        let h_true = make_test_homography();
        let mut rng = StdRng::seed_from_u64(42);

        let mut src = grid(5, 60.0);
        let mut dst: Vec<[f64; 2]> = src
            .iter()
            .map(|s| {
                let d = project(&h_true, s[0], s[1]);
                [d[0] + rng.gen_range(-0.3..0.3), d[1] + rng.gen_range(-0.3..0.3)]
            })
            .collect();
        for _ in 0..8 {
            src.push([rng.gen_range(0.0..300.0), rng.gen_range(0.0..300.0)]);
            dst.push([rng.gen_range(400.0..900.0), rng.gen_range(400.0..900.0)]);
        }

        let config = RansacHomographyConfig {
            inlier_threshold: 3.0,
            seed: 99,
            ..Default::default()
        };
        let result = fit_homography_ransac(&src, &dst, &config).unwrap();

        assert!(result.n_inliers >= 23, "only {} inliers", result.n_inliers);
        assert!(result.inlier_mask[25..].iter().all(|&m| !m));
        assert_eq!(result.errors.len(), src.len());
        assert_eq!(result.inlier_errors().len(), result.n_inliers);
    }

    #[test]
    fn ransac_is_deterministic_for_a_seed() {
        let src = grid(4, 50.0);
        let h_true = make_test_homography();
        let dst: Vec<[f64; 2]> = src.iter().map(|s| project(&h_true, s[0], s[1])).collect();
        let cfg = RansacHomographyConfig::with_threshold(1.0);
        let a = fit_homography_ransac(&src, &dst, &cfg).unwrap();
        let b = fit_homography_ransac(&src, &dst, &cfg).unwrap();
        assert_eq!(a.h, b.h);
        assert_eq!(a.inlier_mask, b.inlier_mask);
    }

    #[test]
    fn too_few_points() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let err = estimate_homography_dlt(&src, &src).unwrap_err();
        assert_eq!(err, HomographyError::TooFewPoints { needed: 4, got: 3 });
        assert!(fit_homography_ransac(&src, &src, &RansacHomographyConfig::default()).is_err());
    }

    #[test]
    fn sample_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut s = sample_indices(&mut rng, 6, 4);
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 4);
            assert!(s.iter().all(|&i| i < 6));
        }
    }

    #[test]
    fn mean_and_p95_handles_empty_and_non_empty_errors() {
        let mut empty = Vec::<f64>::new();
        assert_eq!(mean_and_p95(&mut empty), (0.0, 0.0));

        let mut values = vec![0.4, 0.1, 0.2, 0.3, 0.5];
        let (mean, p95) = mean_and_p95(&mut values);
        assert_relative_eq!(mean, 0.3, epsilon = 1e-12);
        assert_relative_eq!(p95, 0.5, epsilon = 1e-12);
    }
}
