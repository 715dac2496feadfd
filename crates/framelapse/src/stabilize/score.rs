use serde::{Deserialize, Serialize};

use crate::geometry::{AnchorPair, LandmarkPoint};

/// Resolution-independent distance from goal; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizationScore {
    pub value: f64,
    pub left_distance: f64,
    pub right_distance: f64,
}

impl StabilizationScore {
    pub const ZERO: StabilizationScore = StabilizationScore {
        value: 0.0,
        left_distance: 0.0,
        right_distance: 0.0,
    };

    pub fn is_below(&self, threshold: f64) -> bool {
        self.value < threshold
    }

    pub fn confidence(&self) -> f32 {
        score_confidence(self.value)
    }
}

/// `((left + right) * 1000 / 2) / canvas_height`, `+∞` for a degenerate canvas.
pub fn calculate_score(
    detected_left: &LandmarkPoint,
    detected_right: &LandmarkPoint,
    goal_left: &LandmarkPoint,
    goal_right: &LandmarkPoint,
    canvas_height: f64,
) -> StabilizationScore {
    let left_distance = detected_left.distance(goal_left);
    let right_distance = detected_right.distance(goal_right);
    let value = if canvas_height.is_finite() && canvas_height > 0.0 {
        ((left_distance + right_distance) * 1000.0 / 2.0) / canvas_height
    } else {
        f64::INFINITY
    };
    StabilizationScore {
        value,
        left_distance,
        right_distance,
    }
}

pub(crate) fn score_pair(
    detected: &AnchorPair,
    goal: &AnchorPair,
    canvas_height: f64,
) -> StabilizationScore {
    calculate_score(
        &detected.left,
        &detected.right,
        &goal.left,
        &goal.right,
        canvas_height,
    )
}

/// Map a final score onto `[0.3, 1.0]`.
pub fn score_confidence(score: f64) -> f32 {
    if !score.is_finite() {
        return 0.3;
    }
    let c = if score < 0.5 {
        1.0
    } else if score < 20.0 {
        0.99 - (score - 0.5) / 19.5 * 0.29
    } else {
        (0.7 - (score - 20.0) / 100.0).max(0.3)
    };
    c as f32
}
