//! Validated homography estimation from matched keypoints.

use crate::capability::HomographySolver;
use crate::error::{AlignError, ValidationFailure};
use crate::geometry::HomographyMatrix;
use crate::landmarks::FeatureMatch;
use crate::settings::LandscapeSettings;

use super::ransac::mean_and_p95;

/// Minimum number of correspondences for a projective solve.
pub const MIN_MATCHES: usize = 4;

/// Acceptance bounds for a fitted homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomographyLimits {
    pub min_determinant: f64,
    pub max_determinant: f64,
    pub min_inlier_ratio: f64,
}

impl Default for HomographyLimits {
    fn default() -> Self {
        Self {
            min_determinant: 0.01,
            max_determinant: 100.0,
            min_inlier_ratio: 0.2,
        }
    }
}

impl From<&LandscapeSettings> for HomographyLimits {
    fn from(s: &LandscapeSettings) -> Self {
        Self {
            min_determinant: s.min_determinant,
            max_determinant: s.max_determinant,
            min_inlier_ratio: s.min_inlier_ratio,
        }
    }
}

/// An accepted fit mapping source pixels onto reference pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    pub matrix: HomographyMatrix,
    pub inlier_count: usize,
    /// Aligned with the `matches` passed in.
    pub inlier_mask: Vec<bool>,
    /// Mean reprojection error over inliers (pixels).
    pub mean_error: f64,
    /// 95th-percentile reprojection error over inliers (pixels).
    pub p95_error: f64,
}

impl HomographyEstimate {
    pub fn inlier_ratio(&self) -> f64 {
        if self.inlier_mask.is_empty() {
            0.0
        } else {
            self.inlier_count as f64 / self.inlier_mask.len() as f64
        }
    }
}

/// [`calculate_homography_matrix_with_limits`] with the default bounds.
pub fn calculate_homography_matrix<S: HomographySolver + ?Sized>(
    solver: &S,
    source: &[[f64; 2]],
    reference: &[[f64; 2]],
    matches: &[FeatureMatch],
    ransac_threshold: f64,
) -> Result<HomographyEstimate, AlignError> {
    calculate_homography_matrix_with_limits(
        solver,
        source,
        reference,
        matches,
        ransac_threshold,
        &HomographyLimits::default(),
    )
}

/// Fit `reference ≈ H(source)` over `matches` and reject untrustworthy fits.
///
/// Malformed input fails with [`AlignError::InvalidInput`] before the solver
/// runs; a fit that is singular, too extreme, or backed by too few inliers
/// fails with [`AlignError::Validation`].
pub fn calculate_homography_matrix_with_limits<S: HomographySolver + ?Sized>(
    solver: &S,
    source: &[[f64; 2]],
    reference: &[[f64; 2]],
    matches: &[FeatureMatch],
    ransac_threshold: f64,
    limits: &HomographyLimits,
) -> Result<HomographyEstimate, AlignError> {
    if source.is_empty() || reference.is_empty() {
        return Err(AlignError::invalid("keypoint lists must not be empty"));
    }
    if matches.len() < MIN_MATCHES {
        return Err(AlignError::invalid(format!(
            "at least {MIN_MATCHES} matches required, got {}",
            matches.len()
        )));
    }
    if let Some(m) = matches
        .iter()
        .find(|m| m.source_index >= source.len() || m.reference_index >= reference.len())
    {
        return Err(AlignError::invalid(format!(
            "match ({}, {}) out of bounds for {} source / {} reference keypoints",
            m.source_index,
            m.reference_index,
            source.len(),
            reference.len()
        )));
    }
    if !(ransac_threshold.is_finite() && ransac_threshold > 0.0) {
        return Err(AlignError::invalid(format!(
            "ransac threshold must be positive, got {ransac_threshold}"
        )));
    }

    let src: Vec<[f64; 2]> = matches.iter().map(|m| source[m.source_index]).collect();
    let dst: Vec<[f64; 2]> = matches.iter().map(|m| reference[m.reference_index]).collect();

    let fit = solver
        .compute_homography(&src, &dst, ransac_threshold)
        .map_err(|e| {
            tracing::warn!(error = %e, matches = matches.len(), "homography fit failed");
            ValidationFailure::FitFailed(e)
        })?;

    let matrix = HomographyMatrix::from_matrix3(&fit.h).normalized();
    if !matrix.is_valid() {
        tracing::warn!("rejecting singular homography");
        return Err(ValidationFailure::Singular.into());
    }

    let det = matrix.determinant().abs();
    if det < limits.min_determinant || det > limits.max_determinant {
        tracing::warn!(determinant = det, "rejecting homography with extreme determinant");
        return Err(ValidationFailure::DeterminantOutOfRange {
            determinant: det,
            min: limits.min_determinant,
            max: limits.max_determinant,
        }
        .into());
    }

    let ratio = fit.n_inliers as f64 / matches.len() as f64;
    if ratio < limits.min_inlier_ratio {
        tracing::warn!(
            inliers = fit.n_inliers,
            matches = matches.len(),
            ratio,
            "rejecting unreliable homography"
        );
        return Err(ValidationFailure::UnreliableFit {
            inliers: fit.n_inliers,
            matches: matches.len(),
            ratio,
            min_ratio: limits.min_inlier_ratio,
        }
        .into());
    }

    let mut inlier_errors = fit.inlier_errors();
    let (mean_error, p95_error) = mean_and_p95(&mut inlier_errors);

    Ok(HomographyEstimate {
        matrix,
        inlier_count: fit.n_inliers,
        inlier_mask: fit.inlier_mask,
        mean_error,
        p95_error,
    })
}
