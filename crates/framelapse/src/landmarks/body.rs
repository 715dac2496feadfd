use serde::{Deserialize, Serialize};

use crate::geometry::{AnchorPair, BoundingBox, LandmarkPoint};

/// Body pose keypoints in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyLandmarks {
    pub left_shoulder: LandmarkPoint,
    pub right_shoulder: LandmarkPoint,
    pub left_hip: LandmarkPoint,
    pub right_hip: LandmarkPoint,
    pub neck_center: LandmarkPoint,
    pub bounding_box: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl BodyLandmarks {
    pub fn shoulder_width(&self) -> f64 {
        self.left_shoulder.distance(&self.right_shoulder)
    }

    pub fn hip_center(&self) -> LandmarkPoint {
        self.left_hip.midpoint(&self.right_hip)
    }

    pub fn shoulder_anchors(&self, width: u32, height: u32) -> AnchorPair {
        AnchorPair::new(
            self.left_shoulder.to_pixels(width, height),
            self.right_shoulder.to_pixels(width, height),
        )
    }

    pub fn hip_anchors(&self, width: u32, height: u32) -> AnchorPair {
        AnchorPair::new(
            self.left_hip.to_pixels(width, height),
            self.right_hip.to_pixels(width, height),
        )
    }

    /// Neck → hip-midpoint axis, top first.
    pub fn torso_anchors(&self, width: u32, height: u32) -> AnchorPair {
        AnchorPair::new(
            self.neck_center.to_pixels(width, height),
            self.hip_center().to_pixels(width, height),
        )
    }

    pub fn is_finite(&self) -> bool {
        [
            self.left_shoulder,
            self.right_shoulder,
            self.left_hip,
            self.right_hip,
            self.neck_center,
        ]
        .iter()
        .all(LandmarkPoint::is_finite)
    }
}

/// Which keypoints anchor a muscle-region alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionAnchor {
    Shoulders,
    Hips,
    Torso,
}

impl RegionAnchor {
    /// The matching pair of `body`, in pixel coordinates.
    pub fn select(self, body: &BodyLandmarks, width: u32, height: u32) -> AnchorPair {
        match self {
            Self::Shoulders => body.shoulder_anchors(width, height),
            Self::Hips => body.hip_anchors(width, height),
            Self::Torso => body.torso_anchors(width, height),
        }
    }
}

/// Body region tracked by muscle-progress timelapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleRegion {
    #[default]
    FullBody,
    UpperBody,
    LowerBody,
    Arms,
    Legs,
}

impl MuscleRegion {
    pub const ALL: [MuscleRegion; 5] = [
        MuscleRegion::FullBody,
        MuscleRegion::UpperBody,
        MuscleRegion::LowerBody,
        MuscleRegion::Arms,
        MuscleRegion::Legs,
    ];

    pub fn anchor(self) -> RegionAnchor {
        match self {
            Self::FullBody => RegionAnchor::Torso,
            Self::UpperBody | Self::Arms => RegionAnchor::Shoulders,
            Self::LowerBody | Self::Legs => RegionAnchor::Hips,
        }
    }

    /// Anchor pair for this region, in pixel coordinates.
    pub fn anchors(self, body: &BodyLandmarks, width: u32, height: u32) -> AnchorPair {
        self.anchor().select(body, width, height)
    }
}
