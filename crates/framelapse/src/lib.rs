//! framelapse: multi-pass frame stabilization for timelapse sequences.
//!
//! Frames of a face, body, muscle region or landscape are aligned onto a
//! common canvas by a bounded loop of detect → score → correct → warp
//! passes:
//!
//! 1. **Score** – anchor distance from the goal, per mille of canvas height.
//! 2. **Correct** – combined similarity solve (FAST) or per-axis
//!    rotation/scale/translation refiners (SLOW), damped on overshoot.
//! 3. **Warp** – the original frame is re-warped with the cumulative
//!    transform, then landmarks are detected again and re-scored.
//! 4. **Stop** – below the no-action score, at the pass budget, on
//!    convergence, or as soon as a pass fails to improve.
//!
//! Landscape frames run the same loop over a RANSAC homography fitted to
//! feature matches against a reference frame.
//!
//! # Public API
//! - [`Stabilizer`] routes an [`AlignRequest`] by [`ContentType`]
//! - [`ImageProcessor`], [`FaceDetector`], [`BodyPoseDetector`] and
//!   [`FeatureMatcher`] are the injected platform capabilities
//! - [`AlignmentSettings`] carries every threshold, loadable from JSON
//! - [`align_batch`] aligns many files in parallel with atomic writes
//! - [`ImageBufferProcessor`] is a ready-made backend over `image::RgbaImage`

mod api;
mod backend;
mod batch;
mod body;
mod capability;
mod error;
mod face;
mod geometry;
pub mod homography;
mod landmarks;
pub mod landscape;
mod manual;
mod settings;
pub mod stabilize;

pub use api::{AlignRequest, ContentType, Stabilizer};
pub use backend::ImageBufferProcessor;
pub use batch::{align_batch, BatchJob, BatchOptions, BatchOutcome, BatchProgressFn};
pub use body::{align_body, stabilize_body, stabilize_muscle};
pub use capability::{
    BodyPoseDetector, CropRect, FaceDetector, FeatureMatcher, HomographySolver, ImageProcessor,
    RansacSolver,
};
pub use error::{AlignError, DetectionSubject, ProcessingError, ValidationFailure};
pub use face::{align_face, check_face_sanity, stabilize_face};
pub use geometry::{
    AlignmentMatrix, AnchorPair, BoundingBox, FrameTransform, HomographyMatrix, LandmarkPoint,
};
pub use homography::{calculate_homography_matrix, HomographyEstimate, RansacHomographyConfig};
pub use landmarks::{
    BodyLandmarks, FaceLandmarks, FeatureDetectorKind, FeatureKeypoint, FeatureMatch,
    LandscapeFeatures, MuscleRegion, RegionAnchor, FACE_LANDMARK_COUNT,
};
pub use landscape::stabilize_landscape;
pub use manual::ManualAdjustment;
pub use settings::{
    AlignmentSettings, BodyAlignmentSettings, LandscapeSettings, SettingsError, StabilizationMode,
    StabilizationSettings,
};
pub use stabilize::{
    calculate_alignment_matrix, calculate_score, CancellationToken, EarlyStopReason, RunControl,
    StabilizationPass, StabilizationProgress, StabilizationResult, StabilizationScore,
    StabilizationStage, Stabilized,
};
