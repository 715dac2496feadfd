use serde::{Deserialize, Serialize};

use crate::geometry::{AlignmentMatrix, AnchorPair, LandmarkPoint};

/// Per-axis excess of both anchors past their goals.
///
/// An axis carries non-zero excesses only when overshoot was detected on
/// it; elsewhere both values are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OvershootCorrection {
    pub overshot_left_x: f64,
    pub overshot_left_y: f64,
    pub overshot_right_x: f64,
    pub overshot_right_y: f64,
    /// Score at detection time.
    pub score: f64,
}

impl OvershootCorrection {
    pub fn x_detected(&self) -> bool {
        shared_sign(self.overshot_left_x, self.overshot_right_x).is_some()
    }

    pub fn y_detected(&self) -> bool {
        shared_sign(self.overshot_left_y, self.overshot_right_y).is_some()
    }

    pub fn is_detected(&self) -> bool {
        self.x_detected() || self.y_detected()
    }

    /// Replace the pull on each overshooting axis by the smaller shared excess.
    ///
    /// `offset` is the goal-minus-detected midpoint displacement a correction
    /// would apply. On a detected axis the result pulls back exactly the
    /// smaller-magnitude excess, so neither anchor is pushed past its goal.
    pub fn damp(&self, offset: [f64; 2]) -> [f64; 2] {
        [
            damp_axis(offset[0], self.overshot_left_x, self.overshot_right_x),
            damp_axis(offset[1], self.overshot_left_y, self.overshot_right_y),
        ]
    }

    /// Adjust `matrix` so that the displacement it gives `pivot` is damped.
    pub fn damp_matrix(&self, matrix: &AlignmentMatrix, pivot: &LandmarkPoint) -> AlignmentMatrix {
        if !self.is_detected() {
            return *matrix;
        }
        let moved = matrix.apply(pivot);
        let offset = [moved.x - pivot.x, moved.y - pivot.y];
        let damped = self.damp(offset);
        matrix.translate_by(damped[0] - offset[0], damped[1] - offset[1])
    }
}

fn shared_sign(left: f64, right: f64) -> Option<f64> {
    let (sl, sr) = (sign(left), sign(right));
    (sl != 0.0 && sl == sr).then_some(sl)
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn damp_axis(offset: f64, left: f64, right: f64) -> f64 {
    match shared_sign(left, right) {
        Some(s) => -s * left.abs().min(right.abs()),
        None => offset,
    }
}

/// Detect anchors that are past their goals in the same direction.
pub fn detect_overshoot(
    detected_left: &LandmarkPoint,
    detected_right: &LandmarkPoint,
    goal_left: &LandmarkPoint,
    goal_right: &LandmarkPoint,
    current_score: f64,
    no_action_threshold: f64,
) -> OvershootCorrection {
    let mut out = OvershootCorrection {
        score: current_score,
        ..Default::default()
    };
    if !(current_score > no_action_threshold) {
        return out;
    }
    let (lx, rx) = (detected_left.x - goal_left.x, detected_right.x - goal_right.x);
    let (ly, ry) = (detected_left.y - goal_left.y, detected_right.y - goal_right.y);
    if shared_sign(lx, rx).is_some() {
        out.overshot_left_x = lx;
        out.overshot_right_x = rx;
    }
    if shared_sign(ly, ry).is_some() {
        out.overshot_left_y = ly;
        out.overshot_right_y = ry;
    }
    if out.is_detected() {
        tracing::trace!(
            x = out.x_detected(),
            y = out.y_detected(),
            score = current_score,
            "overshoot detected"
        );
    }
    out
}

pub(crate) fn detect_pair_overshoot(
    detected: &AnchorPair,
    goal: &AnchorPair,
    current_score: f64,
    no_action_threshold: f64,
) -> OvershootCorrection {
    detect_overshoot(
        &detected.left,
        &detected.right,
        &goal.left,
        &goal.right,
        current_score,
        no_action_threshold,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> LandmarkPoint {
        LandmarkPoint::new(x, y)
    }

    #[test]
    fn same_side_excess_is_detected_per_axis() {
        let o = detect_overshoot(
            &p(110.0, 50.0),
            &p(204.0, 45.0),
            &p(100.0, 50.0),
            &p(200.0, 50.0),
            5.0,
            0.5,
        );
        assert!(o.x_detected());
        assert!(!o.y_detected());
        assert_relative_eq!(o.overshot_left_x, 10.0);
        assert_relative_eq!(o.overshot_right_x, 4.0);
        assert_eq!(o.overshot_left_y, 0.0);
        assert_eq!(o.overshot_right_y, 0.0);
    }

    #[test]
    fn nothing_detected_at_or_below_no_action() {
        let o = detect_overshoot(
            &p(110.0, 60.0),
            &p(210.0, 60.0),
            &p(100.0, 50.0),
            &p(200.0, 50.0),
            0.5,
            0.5,
        );
        assert!(!o.is_detected());
        assert_relative_eq!(o.score, 0.5);
    }

    #[test]
    fn opposite_or_zero_excess_is_not_overshoot() {
        let o = detect_overshoot(
            &p(90.0, 50.0),
            &p(210.0, 50.0),
            &p(100.0, 50.0),
            &p(200.0, 50.0),
            5.0,
            0.5,
        );
        assert!(!o.is_detected());
    }

    #[test]
    fn damping_pulls_back_smaller_excess() {
        let o = detect_overshoot(
            &p(110.0, 50.0),
            &p(204.0, 50.0),
            &p(100.0, 50.0),
            &p(200.0, 50.0),
            5.0,
            0.5,
        );
        let damped = o.damp([-7.0, 3.0]);
        assert_relative_eq!(damped[0], -4.0);
        assert_relative_eq!(damped[1], 3.0);
    }

    #[test]
    fn damp_matrix_adjusts_pivot_displacement_only() {
        let o = detect_overshoot(
            &p(110.0, 50.0),
            &p(204.0, 50.0),
            &p(100.0, 50.0),
            &p(200.0, 50.0),
            5.0,
            0.5,
        );
        let pivot = p(157.0, 50.0);
        let m = AlignmentMatrix::translation(-7.0, 0.0);
        let d = o.damp_matrix(&m, &pivot);
        let moved = d.apply(&pivot);
        assert_relative_eq!(moved.x, 153.0);
        assert_relative_eq!(moved.y, 50.0);
    }
}
