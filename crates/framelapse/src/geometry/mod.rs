//! Value types for points and planar transforms.

mod affine;
mod homography;
mod point;

pub use affine::AlignmentMatrix;
pub use homography::HomographyMatrix;
pub use point::{AnchorPair, BoundingBox, LandmarkPoint};

use serde::{Deserialize, Serialize};

/// Cumulative transform from the input frame onto the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameTransform {
    Affine(AlignmentMatrix),
    Projective(HomographyMatrix),
}

impl FrameTransform {
    pub fn project(&self, p: &LandmarkPoint) -> Option<LandmarkPoint> {
        match self {
            Self::Affine(m) => Some(m.apply(p)),
            Self::Projective(h) => h.project(p),
        }
    }

    pub fn as_homography(&self) -> HomographyMatrix {
        match self {
            Self::Affine(m) => HomographyMatrix::from_affine(m),
            Self::Projective(h) => *h,
        }
    }
}
