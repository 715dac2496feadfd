//! Face stabilization: drive the eye centers onto goal positions.

use crate::capability::{FaceDetector, ImageProcessor};
use crate::error::{AlignError, DetectionSubject, ValidationFailure};
use crate::geometry::{AnchorPair, LandmarkPoint};
use crate::settings::AlignmentSettings;
use crate::stabilize::engine::{run_pair_stabilization, LocateFn, PairOutcome, PairTarget};
use crate::stabilize::{angle_between, RunControl, Stabilized};

/// Allowed relative deviation of the final eye distance from the goal.
const MAX_EYE_DISTANCE_DEVIATION: f64 = 0.25;
/// Allowed residual eye-line tilt, in degrees.
const MAX_TILT_DEG: f64 = 10.0;
/// Allowed midpoint offset as a fraction of the shorter canvas side.
const MAX_CENTER_OFFSET: f64 = 0.10;

/// Stabilize a face so its eyes land on `goal_left` / `goal_right` (canvas pixels).
pub fn stabilize_face<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    goal_left: LandmarkPoint,
    goal_right: LandmarkPoint,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: FaceDetector<P::Image> + ?Sized,
{
    let goal = AnchorPair::new(goal_left, goal_right);
    run_face(processor, detector, image, goal, settings, control).map(|o| o.stabilized)
}

/// Align a face onto the settings' canvas and sanity-check the outcome.
///
/// An alignment that missed the success threshold is rejected with
/// [`ValidationFailure::LandmarkSanity`] when its final landmarks are also
/// implausible; otherwise the result is returned as-is for the caller to
/// judge.
pub fn align_face<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: FaceDetector<P::Image> + ?Sized,
{
    let goal = settings.goal_eye_positions();
    let outcome = run_face(processor, detector, image, goal, settings, control)?;
    if !outcome.stabilized.result.success {
        let canvas = settings.canvas_size();
        if let Err(reason) = check_face_sanity(&outcome.final_anchors, &goal, canvas) {
            tracing::warn!(
                final_score = outcome.stabilized.result.final_score,
                %reason,
                "rejecting face alignment"
            );
            return Err(ValidationFailure::LandmarkSanity(reason).into());
        }
    }
    Ok(outcome.stabilized)
}

fn run_face<P, D>(
    processor: &P,
    detector: &D,
    image: &P::Image,
    goal: AnchorPair,
    settings: &AlignmentSettings,
    control: RunControl<'_>,
) -> Result<PairOutcome<P::Image>, AlignError>
where
    P: ImageProcessor,
    D: FaceDetector<P::Image> + ?Sized,
{
    settings.validate()?;
    let locate = |img: &P::Image, size: [u32; 2]| {
        detector
            .detect_face(img, size[0], size[1])
            .filter(|face| face.is_finite())
            .map(|face| face.eye_anchors(size[0], size[1]))
    };
    let locate: &LocateFn<'_, P::Image> = &locate;
    run_pair_stabilization(
        processor,
        image,
        PairTarget {
            subject: DetectionSubject::Face,
            goal,
            locate,
        },
        settings.canvas_size(),
        &settings.stabilization,
        control,
    )
}

/// Plausibility of final eye positions on a `canvas`.
pub fn check_face_sanity(
    eyes: &AnchorPair,
    goal: &AnchorPair,
    canvas: [u32; 2],
) -> Result<(), String> {
    let (w, h) = (canvas[0] as f64, canvas[1] as f64);
    let inside = |p: &LandmarkPoint| (0.0..=w).contains(&p.x) && (0.0..=h).contains(&p.y);
    if !(inside(&eyes.left) && inside(&eyes.right)) {
        return Err("eyes outside the canvas".to_string());
    }

    let goal_distance = goal.distance();
    if goal_distance > 0.0 {
        let deviation = (eyes.distance() / goal_distance - 1.0).abs();
        if deviation > MAX_EYE_DISTANCE_DEVIATION {
            return Err(format!(
                "eye distance off by {:.0}% of goal",
                deviation * 100.0
            ));
        }
    }

    let tilt = angle_between(eyes, goal).to_degrees().abs();
    if tilt >= MAX_TILT_DEG {
        return Err(format!("eye line tilted {tilt:.1}°"));
    }

    let offset = eyes.midpoint().distance(&goal.midpoint());
    let limit = MAX_CENTER_OFFSET * w.min(h);
    if offset > limit {
        return Err(format!("eye midpoint {offset:.1}px from goal (limit {limit:.1}px)"));
    }
    Ok(())
}
