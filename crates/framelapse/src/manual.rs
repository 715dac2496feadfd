//! User-placed landmarks that bypass detection.

use serde::{Deserialize, Serialize};

use crate::api::ContentType;
use crate::error::{AlignError, ValidationFailure};
use crate::geometry::{AnchorPair, BoundingBox, FrameTransform, HomographyMatrix, LandmarkPoint};
use crate::homography::estimate_homography_dlt;
use crate::landmarks::{MuscleRegion, RegionAnchor};
use crate::settings::AlignmentSettings;
use crate::stabilize::{score_pair, solve_anchor_pair};

/// Manually placed landmarks, normalized to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManualAdjustment {
    Face {
        left_eye: LandmarkPoint,
        right_eye: LandmarkPoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nose_tip: Option<LandmarkPoint>,
    },
    Body {
        shoulders: AnchorPair,
        hips: AnchorPair,
    },
    Muscle {
        region: MuscleRegion,
        bounds: BoundingBox,
    },
    /// Source-image corners that should land on the canvas corners, in
    /// top-left, top-right, bottom-right, bottom-left order.
    Landscape { corners: [LandmarkPoint; 4] },
}

impl ManualAdjustment {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Face { .. } => ContentType::Face,
            Self::Body { .. } => ContentType::Body,
            Self::Muscle { region, .. } => ContentType::Muscle(*region),
            Self::Landscape { .. } => ContentType::Landscape,
        }
    }

    /// Every placed point, in a fixed per-variant order.
    pub fn to_landmarks(&self) -> Vec<LandmarkPoint> {
        match self {
            Self::Face {
                left_eye,
                right_eye,
                nose_tip,
            } => {
                let mut points = vec![*left_eye, *right_eye];
                points.extend(nose_tip.iter().copied());
                points
            }
            Self::Body { shoulders, hips } => {
                vec![shoulders.left, shoulders.right, hips.left, hips.right]
            }
            Self::Muscle { bounds, .. } => vec![
                LandmarkPoint::new(bounds.left, bounds.top),
                LandmarkPoint::new(bounds.right, bounds.top),
                LandmarkPoint::new(bounds.right, bounds.bottom),
                LandmarkPoint::new(bounds.left, bounds.bottom),
            ],
            Self::Landscape { corners } => corners.to_vec(),
        }
    }

    /// Pixel anchors on the source and their goals on the canvas, for the
    /// pair-based variants.
    pub(crate) fn anchor_goal(
        &self,
        image_size: [u32; 2],
        settings: &AlignmentSettings,
    ) -> Option<(AnchorPair, AnchorPair)> {
        let [w, h] = image_size;
        let px = |p: &LandmarkPoint| p.to_pixels(w, h);
        let size = settings.output_size;
        match self {
            Self::Face {
                left_eye,
                right_eye,
                ..
            } => Some((
                AnchorPair::new(px(left_eye), px(right_eye)),
                settings.goal_eye_positions(),
            )),
            Self::Body { shoulders, .. } => Some((
                shoulders.map(px),
                settings.body.goal_anchors(RegionAnchor::Shoulders, size),
            )),
            Self::Muscle { region, bounds } => {
                let b = bounds.to_pixels(w, h);
                let anchors = match region.anchor() {
                    RegionAnchor::Torso => AnchorPair::new(b.top_center(), b.bottom_center()),
                    RegionAnchor::Shoulders | RegionAnchor::Hips => {
                        let cy = b.center().y;
                        AnchorPair::new(
                            LandmarkPoint::new(b.left, cy),
                            LandmarkPoint::new(b.right, cy),
                        )
                    }
                };
                Some((anchors, settings.body.region_goal(*region, size)))
            }
            Self::Landscape { .. } => None,
        }
    }

    /// Transform taking the source image onto the settings' canvas.
    pub fn transform(
        &self,
        image_size: [u32; 2],
        settings: &AlignmentSettings,
    ) -> Result<FrameTransform, AlignError> {
        if image_size[0] == 0 || image_size[1] == 0 {
            return Err(AlignError::invalid("image size must be positive"));
        }
        if !self.to_landmarks().iter().all(LandmarkPoint::is_finite) {
            return Err(AlignError::invalid("manual landmarks must be finite"));
        }

        if let Some((anchors, goal)) = self.anchor_goal(image_size, settings) {
            if anchors.distance() <= f64::EPSILON {
                return Err(AlignError::invalid("manual anchors must be distinct"));
            }
            return Ok(FrameTransform::Affine(solve_anchor_pair(&anchors, &goal)));
        }

        let Self::Landscape { corners } = self else {
            return Err(AlignError::invalid("unsupported manual adjustment"));
        };
        let src: Vec<[f64; 2]> = corners
            .iter()
            .map(|c| c.to_pixels(image_size[0], image_size[1]).xy())
            .collect();
        let dst = canvas_corners(settings.canvas_size());
        let h = estimate_homography_dlt(&src, &dst).map_err(ValidationFailure::FitFailed)?;
        let matrix = HomographyMatrix::from_matrix3(&h).normalized();
        if !matrix.is_valid() {
            return Err(ValidationFailure::Singular.into());
        }
        Ok(FrameTransform::Projective(matrix))
    }
}

impl ManualAdjustment {
    /// Scores before and after `transform`, on the settings' canvas.
    pub(crate) fn scores(
        &self,
        image_size: [u32; 2],
        settings: &AlignmentSettings,
        transform: &FrameTransform,
    ) -> (f64, f64) {
        let canvas_height = settings.output_size as f64;
        if let Some((anchors, goal)) = self.anchor_goal(image_size, settings) {
            let moved = anchors.map(|p| transform.project(p).unwrap_or(*p));
            return (
                score_pair(&anchors, &goal, canvas_height).value,
                score_pair(&moved, &goal, canvas_height).value,
            );
        }
        let [w, h] = image_size;
        let targets = canvas_corners(settings.canvas_size());
        let corners: Vec<LandmarkPoint> = self
            .to_landmarks()
            .into_iter()
            .map(|c| c.to_pixels(w, h))
            .collect();
        let mean_offset = |points: &[Option<LandmarkPoint>]| {
            let total: f64 = points
                .iter()
                .zip(&targets)
                .map(|(p, t)| match p {
                    Some(p) => p.distance(&LandmarkPoint::from(*t)),
                    None => f64::INFINITY,
                })
                .sum();
            total / targets.len() as f64 * 1000.0 / canvas_height
        };
        let before: Vec<Option<LandmarkPoint>> = corners.iter().copied().map(Some).collect();
        let after: Vec<Option<LandmarkPoint>> =
            corners.iter().map(|c| transform.project(c)).collect();
        (mean_offset(&before), mean_offset(&after))
    }
}

pub(crate) fn canvas_corners(size: [u32; 2]) -> Vec<[f64; 2]> {
    let (w, h) = (size[0] as f64, size[1] as f64);
    vec![[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
}
