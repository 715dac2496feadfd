use serde::{Deserialize, Serialize};

use crate::geometry::LandmarkPoint;

/// Feature detector family used for landscape matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureDetectorKind {
    #[default]
    Orb,
    Akaze,
}

/// A scale-space keypoint with a normalized `position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureKeypoint {
    pub position: LandmarkPoint,
    /// Detector strength.
    pub response: f32,
    pub size: f32,
    /// Orientation in degrees, `-1` when not computed.
    pub angle: f32,
    /// Pyramid level the keypoint was found on.
    pub octave: i32,
}

impl FeatureKeypoint {
    pub fn at(position: LandmarkPoint) -> Self {
        Self {
            position,
            response: 0.0,
            size: 1.0,
            angle: -1.0,
            octave: 0,
        }
    }

    pub fn pixel_position(&self, width: u32, height: u32) -> LandmarkPoint {
        self.position.to_pixels(width, height)
    }
}

/// Correspondence between a source keypoint and a reference keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatch {
    pub source_index: usize,
    pub reference_index: usize,
    /// Descriptor distance (lower is better).
    pub distance: f32,
}

impl FeatureMatch {
    pub const fn new(source_index: usize, reference_index: usize, distance: f32) -> Self {
        Self {
            source_index,
            reference_index,
            distance,
        }
    }
}

impl From<(usize, usize)> for FeatureMatch {
    fn from((source_index, reference_index): (usize, usize)) -> Self {
        Self::new(source_index, reference_index, 0.0)
    }
}

/// Keypoints detected in one image. Descriptors stay with the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandscapeFeatures {
    pub keypoints: Vec<FeatureKeypoint>,
    pub detector: FeatureDetectorKind,
}

impl LandscapeFeatures {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn pixel_positions(&self, width: u32, height: u32) -> Vec<[f64; 2]> {
        self.keypoints
            .iter()
            .map(|k| k.pixel_position(width, height).xy())
            .collect()
    }
}
