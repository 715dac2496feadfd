//! Detector outputs consumed by the stabilizers.

mod body;
mod face;
mod keypoint;

pub use body::{BodyLandmarks, MuscleRegion, RegionAnchor};
pub use face::{FaceLandmarks, FACE_LANDMARK_COUNT};
pub use keypoint::{FeatureDetectorKind, FeatureKeypoint, FeatureMatch, LandscapeFeatures};
