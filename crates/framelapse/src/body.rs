//! Body and muscle-region stabilization over pose keypoints.

use crate::capability::{BodyPoseDetector, ImageProcessor};
use crate::error::{AlignError, DetectionSubject};
use crate::geometry::AnchorPair;
use crate::landmarks::{BodyLandmarks, MuscleRegion, RegionAnchor};
use crate::settings::AlignmentSettings;
use crate::stabilize::engine::{run_pair_stabilization, LocateFn, PairTarget};
use crate::stabilize::{RunControl, Stabilized};

/// Stabilize a body so its shoulders land on `goal` (canvas pixels).
pub fn stabilize_body<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    goal: AnchorPair,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: BodyPoseDetector<P::Image> + ?Sized,
{
    run_body(
        processor,
        detector,
        image,
        RegionAnchor::Shoulders,
        goal,
        settings,
        control,
    )
}

/// Align a body onto the settings' canvas using the shoulder goal line.
pub fn align_body<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: BodyPoseDetector<P::Image> + ?Sized,
{
    let goal = settings
        .body
        .goal_anchors(RegionAnchor::Shoulders, settings.output_size);
    stabilize_body(processor, detector, image, goal, settings, control)
}

/// Align the anchors of `region` onto their goal placement.
pub fn stabilize_muscle<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    region: MuscleRegion,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: BodyPoseDetector<P::Image> + ?Sized,
{
    let goal = settings.body.region_goal(region, settings.output_size);
    tracing::debug!(?region, anchor = ?region.anchor(), "muscle region alignment");
    run_body(
        processor,
        detector,
        image,
        region.anchor(),
        goal,
        settings,
        control,
    )
}

fn run_body<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    anchor: RegionAnchor,
    goal: AnchorPair,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: BodyPoseDetector<P::Image> + ?Sized,
{
    settings.validate()?;
    let min_confidence = settings.body.min_confidence;
    let locate = |img: &P::Image, size: [u32; 2]| {
        detector
            .detect_body(img, size[0], size[1])
            .filter(|body| accept_body(body, min_confidence))
            .map(|body| anchor.select(&body, size[0], size[1]))
    };
    let locate: &LocateFn<'_, P::Image> = &locate;
    run_pair_stabilization(
        processor,
        image,
        PairTarget {
            subject: DetectionSubject::Body,
            goal,
            locate,
        },
        settings.canvas_size(),
        &settings.stabilization,
        control,
    )
    .map(|outcome| outcome.stabilized)
}

fn accept_body(body: &BodyLandmarks, min_confidence: f32) -> bool {
    if body.confidence < min_confidence {
        tracing::debug!(
            confidence = body.confidence,
            min_confidence,
            "discarding low-confidence pose"
        );
        return false;
    }
    body.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, LandmarkPoint};
    use approx::assert_relative_eq;

    fn body(confidence: f32) -> BodyLandmarks {
        BodyLandmarks {
            left_shoulder: LandmarkPoint::new(0.3, 0.3),
            right_shoulder: LandmarkPoint::new(0.7, 0.3),
            left_hip: LandmarkPoint::new(0.4, 0.6),
            right_hip: LandmarkPoint::new(0.6, 0.6),
            neck_center: LandmarkPoint::new(0.5, 0.25),
            bounding_box: BoundingBox::new(0.2, 0.1, 0.8, 0.9),
            confidence,
        }
    }

    #[test]
    fn low_confidence_is_not_a_detection() {
        assert!(!accept_body(&body(0.2), 0.5));
        assert!(accept_body(&body(0.9), 0.5));
    }

    #[test]
    fn torso_anchor_is_neck_to_hip_center() {
        let a = RegionAnchor::Torso.select(&body(1.0), 100, 200);
        assert_relative_eq!(a.left.x, 50.0);
        assert_relative_eq!(a.left.y, 50.0);
        assert_relative_eq!(a.right.x, 50.0);
        assert_relative_eq!(a.right.y, 120.0, epsilon = 1e-9);
        assert_eq!(MuscleRegion::FullBody.anchors(&body(1.0), 100, 200), a);
    }
}
