use serde::{Deserialize, Serialize};

use crate::geometry::{AnchorPair, BoundingBox, LandmarkPoint};

/// Upper bound on the dense face mesh a detector may attach.
pub const FACE_LANDMARK_COUNT: usize = 478;

/// Face landmarks in normalized image coordinates.
///
/// `left_eye_center` is the eye on the image's left side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye_center: LandmarkPoint,
    pub right_eye_center: LandmarkPoint,
    pub nose_tip: LandmarkPoint,
    pub bounding_box: BoundingBox,
    /// Optional dense mesh (at most [`FACE_LANDMARK_COUNT`] points).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<LandmarkPoint>,
}

impl FaceLandmarks {
    pub fn new(
        left_eye_center: LandmarkPoint,
        right_eye_center: LandmarkPoint,
        nose_tip: LandmarkPoint,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            left_eye_center,
            right_eye_center,
            nose_tip,
            bounding_box,
            points: Vec::new(),
        }
    }

    /// Attach a dense mesh, truncated to [`FACE_LANDMARK_COUNT`].
    pub fn with_points(mut self, mut points: Vec<LandmarkPoint>) -> Self {
        points.truncate(FACE_LANDMARK_COUNT);
        self.points = points;
        self
    }

    pub fn eye_distance(&self) -> f64 {
        self.left_eye_center.distance(&self.right_eye_center)
    }

    /// Eye centers in pixel coordinates of a `width × height` image.
    pub fn eye_anchors(&self, width: u32, height: u32) -> AnchorPair {
        AnchorPair::new(
            self.left_eye_center.to_pixels(width, height),
            self.right_eye_center.to_pixels(width, height),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.left_eye_center.is_finite()
            && self.right_eye_center.is_finite()
            && self.nose_tip.is_finite()
    }
}
