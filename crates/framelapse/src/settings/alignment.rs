use serde::{Deserialize, Serialize};

use crate::geometry::{AnchorPair, LandmarkPoint};
use crate::landmarks::{FeatureDetectorKind, MuscleRegion, RegionAnchor};

use super::stabilization::StabilizationSettings;
use super::SettingsError;

/// Output canvas geometry and per-content-type tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    /// Side of the square output canvas, in pixels.
    pub output_size: u32,
    /// Goal eye distance as a fraction of `output_size`.
    pub target_eye_distance: f64,
    /// Upward shift of the eye line from the canvas center, as a fraction of `output_size`.
    pub vertical_offset: f64,
    pub stabilization: StabilizationSettings,
    pub body: BodyAlignmentSettings,
    pub landscape: LandscapeSettings,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            output_size: 1080,
            target_eye_distance: 0.30,
            vertical_offset: 0.10,
            stabilization: StabilizationSettings::default(),
            body: BodyAlignmentSettings::default(),
            landscape: LandscapeSettings::default(),
        }
    }
}

impl AlignmentSettings {
    pub fn canvas_size(&self) -> [u32; 2] {
        [self.output_size, self.output_size]
    }

    pub fn target_eye_distance_px(&self) -> f64 {
        self.output_size as f64 * self.target_eye_distance
    }

    /// Where the eye midpoint lands on the canvas.
    pub fn target_center(&self) -> LandmarkPoint {
        let size = self.output_size as f64;
        LandmarkPoint::new(size / 2.0, size * (0.5 - self.vertical_offset))
    }

    /// Horizontal goal eye pair centered on [`target_center`](Self::target_center).
    pub fn goal_eye_positions(&self) -> AnchorPair {
        let center = self.target_center();
        let half = self.target_eye_distance_px() / 2.0;
        AnchorPair::new(
            LandmarkPoint::new(center.x - half, center.y),
            LandmarkPoint::new(center.x + half, center.y),
        )
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.output_size == 0 {
            return Err(SettingsError::invalid("output_size must be positive"));
        }
        if !(self.target_eye_distance > 0.0 && self.target_eye_distance < 1.0) {
            return Err(SettingsError::invalid(format!(
                "target_eye_distance must lie in (0, 1), got {}",
                self.target_eye_distance
            )));
        }
        if !(self.vertical_offset > -0.5 && self.vertical_offset < 0.5) {
            return Err(SettingsError::invalid(format!(
                "vertical_offset must lie in (-0.5, 0.5), got {}",
                self.vertical_offset
            )));
        }
        self.stabilization.validate()?;
        self.body.validate()?;
        self.landscape.validate()
    }
}

/// Goal placement of body anchors, as fractions of the canvas side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyAlignmentSettings {
    pub target_shoulder_width: f64,
    pub shoulder_line: f64,
    pub target_hip_width: f64,
    pub hip_line: f64,
    /// Vertical extent of the neck → hip axis for full-body alignment.
    pub torso_top: f64,
    pub torso_bottom: f64,
    /// Detections below this confidence count as "not detected".
    pub min_confidence: f32,
}

impl Default for BodyAlignmentSettings {
    fn default() -> Self {
        Self {
            target_shoulder_width: 0.35,
            shoulder_line: 0.30,
            target_hip_width: 0.25,
            hip_line: 0.55,
            torso_top: 0.25,
            torso_bottom: 0.60,
            min_confidence: 0.5,
        }
    }
}

impl BodyAlignmentSettings {
    /// Goal pair in canvas pixels for the given anchor kind.
    pub fn goal_anchors(&self, anchor: RegionAnchor, output_size: u32) -> AnchorPair {
        let size = output_size as f64;
        let cx = size / 2.0;
        let horizontal = |width: f64, line: f64| {
            AnchorPair::new(
                LandmarkPoint::new(cx - size * width / 2.0, size * line),
                LandmarkPoint::new(cx + size * width / 2.0, size * line),
            )
        };
        match anchor {
            RegionAnchor::Shoulders => horizontal(self.target_shoulder_width, self.shoulder_line),
            RegionAnchor::Hips => horizontal(self.target_hip_width, self.hip_line),
            RegionAnchor::Torso => AnchorPair::new(
                LandmarkPoint::new(cx, size * self.torso_top),
                LandmarkPoint::new(cx, size * self.torso_bottom),
            ),
        }
    }

    pub fn region_goal(&self, region: MuscleRegion, output_size: u32) -> AnchorPair {
        self.goal_anchors(region.anchor(), output_size)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let in_unit = |v: f64| v > 0.0 && v < 1.0;
        if !in_unit(self.target_shoulder_width) || !in_unit(self.target_hip_width) {
            return Err(SettingsError::invalid("body target widths must lie in (0, 1)"));
        }
        if !in_unit(self.shoulder_line) || !in_unit(self.hip_line) {
            return Err(SettingsError::invalid("body anchor lines must lie in (0, 1)"));
        }
        if !(in_unit(self.torso_top)
            && in_unit(self.torso_bottom)
            && self.torso_top < self.torso_bottom)
        {
            return Err(SettingsError::invalid(
                "torso_top and torso_bottom must lie in (0, 1) with top < bottom",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SettingsError::invalid("min_confidence must lie in [0, 1]"));
        }
        Ok(())
    }
}

/// Feature matching and homography acceptance for landscape frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeSettings {
    pub detector: FeatureDetectorKind,
    pub max_keypoints: usize,
    /// Lowe ratio-test threshold passed to the matcher.
    pub ratio_threshold: f32,
    /// Initial RANSAC reprojection threshold (pixels).
    pub ransac_threshold: f64,
    /// Floor for the RANSAC threshold refiner (pixels).
    pub min_ransac_threshold: f64,
    pub min_inlier_ratio: f64,
    pub min_determinant: f64,
    pub max_determinant: f64,
    /// Matches with descriptor distance above `factor × median` are dropped.
    pub match_quality_factor: f32,
    /// Match-quality refiner converges when it drops at most this fraction.
    pub match_quality_tolerance: f64,
    /// RANSAC-threshold refiner converges when the relative change is below this.
    pub ransac_threshold_tolerance: f64,
    /// Perspective refiner converges when the correction moves canvas corners
    /// less than this on average (pixels).
    pub perspective_stability_px: f64,
}

impl Default for LandscapeSettings {
    fn default() -> Self {
        Self {
            detector: FeatureDetectorKind::Orb,
            max_keypoints: 500,
            ratio_threshold: 0.75,
            ransac_threshold: 5.0,
            min_ransac_threshold: 1.0,
            min_inlier_ratio: 0.2,
            min_determinant: 0.01,
            max_determinant: 100.0,
            match_quality_factor: 2.5,
            match_quality_tolerance: 0.05,
            ransac_threshold_tolerance: 0.05,
            perspective_stability_px: 0.5,
        }
    }
}

impl LandscapeSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_keypoints < 4 {
            return Err(SettingsError::invalid("max_keypoints must be at least 4"));
        }
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(SettingsError::invalid("ratio_threshold must lie in (0, 1]"));
        }
        if !(self.ransac_threshold.is_finite() && self.ransac_threshold > 0.0) {
            return Err(SettingsError::invalid("ransac_threshold must be positive"));
        }
        if !(self.min_ransac_threshold > 0.0
            && self.min_ransac_threshold <= self.ransac_threshold)
        {
            return Err(SettingsError::invalid(
                "min_ransac_threshold must be positive and not exceed ransac_threshold",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_ratio) {
            return Err(SettingsError::invalid("min_inlier_ratio must lie in [0, 1]"));
        }
        if !(self.min_determinant > 0.0 && self.min_determinant < self.max_determinant) {
            return Err(SettingsError::invalid(
                "determinant bounds must satisfy 0 < min < max",
            ));
        }
        if !(self.match_quality_factor >= 1.0) {
            return Err(SettingsError::invalid("match_quality_factor must be at least 1"));
        }
        if !(self.perspective_stability_px > 0.0) {
            return Err(SettingsError::invalid("perspective_stability_px must be positive"));
        }
        Ok(())
    }
}
