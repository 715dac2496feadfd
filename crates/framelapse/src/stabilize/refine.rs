//! Single-axis refiners for SLOW mode.
//!
//! Each refiner projects the detected anchors through the matrix built so
//! far, measures its own residual, and either reports convergence (leaving
//! the matrix untouched) or composes exactly one correction after it.

use crate::geometry::{AlignmentMatrix, AnchorPair};
use crate::settings::StabilizationSettings;

use super::overshoot::OvershootCorrection;
use super::result::{EarlyStopReason, StabilizationStage};
use super::solve::{angle_between, MIN_ANCHOR_DISTANCE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRefinement {
    pub matrix: AlignmentMatrix,
    /// Residual before this refiner's correction, in the axis' own unit.
    pub error: f64,
    pub converged: bool,
}

/// Degrees of residual eye-line rotation; corrects about the projected midpoint.
pub fn refine_rotation(
    current: &AlignmentMatrix,
    anchors: &AnchorPair,
    goal: &AnchorPair,
    settings: &StabilizationSettings,
) -> AxisRefinement {
    let projected = anchors.map(|p| current.apply(p));
    let delta = angle_between(&projected, goal);
    let error = delta.to_degrees();
    let converged = error.abs() < settings.rotation_stop_threshold
        || projected.distance() < MIN_ANCHOR_DISTANCE;
    let matrix = if converged {
        *current
    } else {
        current.then(&AlignmentMatrix::rotation_about(delta, projected.midpoint()))
    };
    tracing::trace!(error_deg = error, converged, "rotation refiner");
    AxisRefinement {
        matrix,
        error,
        converged,
    }
}

/// Relative anchor-distance error; corrects by scaling about the projected midpoint.
pub fn refine_scale(
    current: &AlignmentMatrix,
    anchors: &AnchorPair,
    goal: &AnchorPair,
    settings: &StabilizationSettings,
) -> AxisRefinement {
    let projected = anchors.map(|p| current.apply(p));
    let distance = projected.distance();
    if distance < MIN_ANCHOR_DISTANCE || !distance.is_finite() {
        return AxisRefinement {
            matrix: *current,
            error: 0.0,
            converged: true,
        };
    }
    let ratio = goal.distance() / distance;
    let error = ratio - 1.0;
    let converged = error.abs() < settings.scale_error_threshold;
    let matrix = if converged {
        *current
    } else {
        current.then(&AlignmentMatrix::scaling_about(ratio, projected.midpoint()))
    };
    tracing::trace!(error, converged, "scale refiner");
    AxisRefinement {
        matrix,
        error,
        converged,
    }
}

/// Midpoint offset in pixels; the applied shift is damped by `overshoot`.
pub fn refine_translation(
    current: &AlignmentMatrix,
    anchors: &AnchorPair,
    goal: &AnchorPair,
    settings: &StabilizationSettings,
    overshoot: Option<&OvershootCorrection>,
) -> AxisRefinement {
    let projected = anchors.map(|p| current.apply(p)).midpoint();
    let target = goal.midpoint();
    let offset = [target.x - projected.x, target.y - projected.y];
    let error = offset[0].hypot(offset[1]);
    let converged = error < settings.convergence_threshold;
    let matrix = if converged {
        *current
    } else {
        let shift = overshoot.map_or(offset, |o| o.damp(offset));
        current.then(&AlignmentMatrix::translation(shift[0], shift[1]))
    };
    tracing::trace!(error_px = error, converged, "translation refiner");
    AxisRefinement {
        matrix,
        error,
        converged,
    }
}

/// Which refiner an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinerAxis {
    Rotation,
    Scale,
    Translation,
}

impl RefinerAxis {
    pub fn stage(self) -> StabilizationStage {
        match self {
            Self::Rotation => StabilizationStage::Rotation,
            Self::Scale => StabilizationStage::Scale,
            Self::Translation => StabilizationStage::Translation,
        }
    }

    pub fn converged_reason(self) -> EarlyStopReason {
        match self {
            Self::Rotation => EarlyStopReason::RotationConverged,
            Self::Scale => EarlyStopReason::ScaleConverged,
            Self::Translation => EarlyStopReason::TranslationConverged,
        }
    }
}

/// One SLOW refinement pass: rotation, then scale, then translation, from identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementStep {
    pub rotation: AxisRefinement,
    pub scale: AxisRefinement,
    pub translation: AxisRefinement,
}

impl RefinementStep {
    pub fn run(
        anchors: &AnchorPair,
        goal: &AnchorPair,
        settings: &StabilizationSettings,
        overshoot: Option<&OvershootCorrection>,
    ) -> Self {
        let rotation = refine_rotation(&AlignmentMatrix::IDENTITY, anchors, goal, settings);
        let scale = refine_scale(&rotation.matrix, anchors, goal, settings);
        let translation = refine_translation(&scale.matrix, anchors, goal, settings, overshoot);
        Self {
            rotation,
            scale,
            translation,
        }
    }

    pub fn matrix(&self) -> AlignmentMatrix {
        self.translation.matrix
    }

    pub fn all_converged(&self) -> bool {
        self.rotation.converged && self.scale.converged && self.translation.converged
    }

    /// Last refiner in pass order that still applied a correction.
    pub fn last_active(&self) -> Option<RefinerAxis> {
        if !self.translation.converged {
            Some(RefinerAxis::Translation)
        } else if !self.scale.converged {
            Some(RefinerAxis::Scale)
        } else if !self.rotation.converged {
            Some(RefinerAxis::Rotation)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LandmarkPoint;
    use approx::assert_relative_eq;

    fn pair(lx: f64, ly: f64, rx: f64, ry: f64) -> AnchorPair {
        AnchorPair::new(LandmarkPoint::new(lx, ly), LandmarkPoint::new(rx, ry))
    }

    fn goal() -> AnchorPair {
        pair(350.0, 400.0, 650.0, 400.0)
    }

    #[test]
    fn rotation_levels_the_anchor_line() {
        let s = StabilizationSettings::slow();
        let tilted = pair(400.0, 450.0, 600.0, 350.0);
        let r = refine_rotation(&AlignmentMatrix::IDENTITY, &tilted, &goal(), &s);
        assert!(!r.converged);
        let out = tilted.map(|p| r.matrix.apply(p));
        assert_relative_eq!(out.angle(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(out.distance(), tilted.distance(), epsilon = 1e-9);
        assert_relative_eq!(out.midpoint().x, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn scale_matches_goal_distance() {
        let s = StabilizationSettings::slow();
        let small = pair(450.0, 400.0, 550.0, 400.0);
        let r = refine_scale(&AlignmentMatrix::IDENTITY, &small, &goal(), &s);
        assert_relative_eq!(r.error, 2.0);
        let out = small.map(|p| r.matrix.apply(p));
        assert_relative_eq!(out.distance(), 300.0, epsilon = 1e-9);
    }

    #[test]
    fn translation_moves_midpoint_to_goal() {
        let s = StabilizationSettings::slow();
        let shifted = pair(330.0, 420.0, 630.0, 420.0);
        let r = refine_translation(&AlignmentMatrix::IDENTITY, &shifted, &goal(), &s, None);
        assert_relative_eq!(r.error, 800f64.sqrt(), epsilon = 1e-12);
        let out = shifted.map(|p| r.matrix.apply(p));
        assert_relative_eq!(out.left.x, 350.0, epsilon = 1e-9);
        assert_relative_eq!(out.left.y, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn converged_step_is_identity() {
        let s = StabilizationSettings::slow();
        let near = pair(350.1, 400.0, 650.1, 400.0);
        let step = RefinementStep::run(&near, &goal(), &s, None);
        assert!(step.all_converged());
        assert_eq!(step.matrix(), AlignmentMatrix::IDENTITY);
        assert_eq!(step.last_active(), None);
    }

    #[test]
    fn full_step_reaches_goal() {
        let s = StabilizationSettings::slow();
        let off = pair(300.0, 500.0, 690.0, 300.0);
        let step = RefinementStep::run(&off, &goal(), &s, None);
        assert_eq!(step.last_active(), Some(RefinerAxis::Translation));
        let out = off.map(|p| step.matrix().apply(p));
        assert_relative_eq!(out.left.x, 350.0, epsilon = 1e-9);
        assert_relative_eq!(out.right.y, 400.0, epsilon = 1e-9);
    }
}
