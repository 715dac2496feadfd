//! Platform capabilities injected into the stabilizers.
//!
//! Everything here must be safe to call from several frames at once during
//! batch alignment.

use std::path::Path;

use crate::error::ProcessingError;
use crate::geometry::{AlignmentMatrix, HomographyMatrix};
use crate::homography::{
    fit_homography_ransac, HomographyError, RansacHomographyConfig, RansacHomographyResult,
};
use crate::landmarks::{
    BodyLandmarks, FaceLandmarks, FeatureDetectorKind, FeatureMatch, LandscapeFeatures,
};

/// Pixel rectangle for [`ImageProcessor::crop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Image transform and I/O backend.
///
/// Warps map source pixels onto a fresh `width × height` canvas; matrices
/// are forward transforms (source → canvas).
pub trait ImageProcessor: Send + Sync {
    type Image: Clone + Send + Sync;

    fn dimensions(&self, image: &Self::Image) -> (u32, u32);

    fn apply_affine(
        &self,
        image: &Self::Image,
        matrix: &AlignmentMatrix,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, ProcessingError>;

    fn apply_homography(
        &self,
        image: &Self::Image,
        matrix: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, ProcessingError>;

    fn crop(&self, image: &Self::Image, rect: CropRect) -> Result<Self::Image, ProcessingError>;

    fn resize(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, ProcessingError>;

    fn load(&self, path: &Path) -> Result<Self::Image, ProcessingError>;

    fn save(&self, image: &Self::Image, path: &Path) -> Result<(), ProcessingError>;
}

/// Face landmark extraction. Landmarks are normalized to the image size.
pub trait FaceDetector<I>: Send + Sync {
    fn detect_face(&self, image: &I, width: u32, height: u32) -> Option<FaceLandmarks>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Body pose extraction. Landmarks are normalized to the image size.
pub trait BodyPoseDetector<I>: Send + Sync {
    fn detect_body(&self, image: &I, width: u32, height: u32) -> Option<BodyLandmarks>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Robust projective fit over pixel correspondences (`dst ≈ H(src)`).
///
/// The default uses the built-in RANSAC estimator; native backends may
/// substitute their own.
pub trait HomographySolver {
    fn compute_homography(
        &self,
        src: &[[f64; 2]],
        dst: &[[f64; 2]],
        threshold: f64,
    ) -> Result<RansacHomographyResult, HomographyError> {
        fit_homography_ransac(src, dst, &RansacHomographyConfig::with_threshold(threshold))
    }
}

/// The built-in RANSAC estimator on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct RansacSolver;

impl HomographySolver for RansacSolver {}

/// Keypoint detection and descriptor matching for landscape frames.
pub trait FeatureMatcher<I>: HomographySolver + Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn detect_features(
        &self,
        image: &I,
        kind: FeatureDetectorKind,
        max_keypoints: usize,
    ) -> Option<LandscapeFeatures>;

    /// Match `source` against `reference`, keeping pairs that pass the
    /// ratio test at `ratio_threshold`.
    fn match_features(
        &self,
        source: &LandscapeFeatures,
        reference: &LandscapeFeatures,
        ratio_threshold: f32,
    ) -> Vec<FeatureMatch>;
}
