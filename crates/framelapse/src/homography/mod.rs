//! Robust homography estimation for landscape alignment.

mod ransac;
mod validate;

pub use ransac::{
    estimate_homography_dlt, fit_homography_ransac, project, reprojection_error, HomographyError,
    RansacHomographyConfig, RansacHomographyResult,
};
pub(crate) use ransac::mean_and_p95;
pub use validate::{
    calculate_homography_matrix, calculate_homography_matrix_with_limits, HomographyEstimate,
    HomographyLimits, MIN_MATCHES,
};
