use crate::geometry::{AlignmentMatrix, AnchorPair, LandmarkPoint};
use crate::landmarks::FaceLandmarks;
use crate::settings::AlignmentSettings;

/// Anchor distances below this are treated as coincident.
pub(crate) const MIN_ANCHOR_DISTANCE: f64 = 1e-9;

/// Similarity that takes the detected pair onto the goal pair.
///
/// The detected midpoint lands exactly on the goal midpoint. Coincident
/// detected anchors fall back to scale 1 and rotation 0.
pub fn solve_pair_alignment(
    detected_left: &LandmarkPoint,
    detected_right: &LandmarkPoint,
    goal_left: &LandmarkPoint,
    goal_right: &LandmarkPoint,
) -> AlignmentMatrix {
    let detected = AnchorPair::new(*detected_left, *detected_right);
    let goal = AnchorPair::new(*goal_left, *goal_right);
    solve_anchor_pair(&detected, &goal)
}

pub(crate) fn solve_anchor_pair(detected: &AnchorPair, goal: &AnchorPair) -> AlignmentMatrix {
    let distance = detected.distance();
    let (angle, scale) = if distance < MIN_ANCHOR_DISTANCE || !distance.is_finite() {
        (0.0, 1.0)
    } else {
        (
            angle_between(detected, goal),
            goal.distance() / distance,
        )
    };
    AlignmentMatrix::similarity_mapping(angle, scale, detected.midpoint(), goal.midpoint())
}

/// Combined solve for a face in a `image_size` frame onto the settings' canvas.
pub fn calculate_alignment_matrix(
    landmarks: &FaceLandmarks,
    image_size: [u32; 2],
    settings: &AlignmentSettings,
) -> AlignmentMatrix {
    let eyes = landmarks.eye_anchors(image_size[0], image_size[1]);
    solve_anchor_pair(&eyes, &settings.goal_eye_positions())
}

/// Rotation (radians, wrapped) that turns the `detected` line onto the `goal` line.
pub(crate) fn angle_between(detected: &AnchorPair, goal: &AnchorPair) -> f64 {
    wrap_angle(goal.angle() - detected.angle())
}

/// Wrap to `(-π, π]`.
pub(crate) fn wrap_angle(a: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut w = a % TAU;
    if w <= -PI {
        w += TAU;
    } else if w > PI {
        w -= TAU;
    }
    w
}
