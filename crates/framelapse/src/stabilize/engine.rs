//! The pass loop shared by the pair-anchored stabilizers (face, body, muscle).

use std::time::Instant;

use crate::capability::ImageProcessor;
use crate::error::{AlignError, DetectionSubject};
use crate::geometry::{AlignmentMatrix, AnchorPair, FrameTransform};
use crate::settings::{StabilizationMode, StabilizationSettings};

use super::control::RunControl;
use super::overshoot::detect_pair_overshoot;
use super::refine::{RefinementStep, RefinerAxis};
use super::result::{
    EarlyStopReason, StabilizationPass, StabilizationProgress, StabilizationResult,
    StabilizationStage, Stabilized,
};
use super::score::{score_confidence, score_pair, StabilizationScore};
use super::solve::solve_anchor_pair;

/// Locates the anchor pair (in pixels) on an image of the given size.
pub(crate) type LocateFn<'a, I> = dyn Fn(&I, [u32; 2]) -> Option<AnchorPair> + 'a;

/// What the pass loop drives toward.
pub(crate) struct PairTarget<'a, I> {
    pub subject: DetectionSubject,
    pub goal: AnchorPair,
    pub locate: &'a LocateFn<'a, I>,
}

pub(crate) struct PairOutcome<I> {
    pub stabilized: Stabilized<I>,
    /// Anchors detected on the returned image.
    pub final_anchors: AnchorPair,
}

/// Append-only pass log plus the bookkeeping every stabilizer reports.
pub(crate) struct RunLog {
    started: Instant,
    mode: StabilizationMode,
    initial_score: f64,
    passes: Vec<StabilizationPass>,
}

impl RunLog {
    pub fn start(mode: StabilizationMode, initial_score: f64) -> Self {
        Self {
            started: Instant::now(),
            mode,
            initial_score,
            passes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn record(&mut self, pass: StabilizationPass) {
        tracing::debug!(
            pass = pass.pass_number,
            stage = ?pass.stage,
            before = pass.score_before,
            after = pass.score_after,
            converged = pass.converged,
            "stabilization pass"
        );
        self.passes.push(pass);
    }

    pub fn finish(
        self,
        final_score: f64,
        reason: Option<EarlyStopReason>,
        goal_distance: Option<f64>,
        transform: FrameTransform,
        success_threshold: f64,
    ) -> StabilizationResult {
        let success = final_score < success_threshold;
        let result = StabilizationResult {
            success,
            mode: self.mode,
            initial_score: self.initial_score,
            final_score,
            passes_executed: self.passes.len(),
            passes: self.passes,
            early_stop_reason: reason,
            total_duration_ms: elapsed_ms(self.started),
            goal_eye_distance: goal_distance,
            transform,
            confidence: score_confidence(final_score),
        };
        tracing::info!(
            success,
            initial = result.initial_score,
            final_score,
            passes = result.passes_executed,
            reason = ?reason,
            "stabilization finished"
        );
        result
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run the multi-pass loop for one anchor pair.
///
/// Every pass re-warps the original image with the cumulative matrix, so
/// resampling error never accumulates across passes.
pub(crate) fn run_pair_stabilization<P: ImageProcessor>(
    processor: &P,
    image: &P::Image,
    target: PairTarget<'_, P::Image>,
    canvas: [u32; 2],
    settings: &StabilizationSettings,
    mut control: RunControl<'_>,
) -> Result<PairOutcome<P::Image>, AlignError> {
    if canvas[0] == 0 || canvas[1] == 0 {
        return Err(AlignError::invalid("canvas size must be positive"));
    }
    let canvas_height = canvas[1] as f64;
    let goal = target.goal;
    let max_passes = settings.max_passes();

    let locate = |img: &P::Image, pass: usize| -> Result<AnchorPair, AlignError> {
        let (w, h) = processor.dimensions(img);
        match (target.locate)(img, [w, h]) {
            Some(anchors) if anchors.is_finite() => Ok(anchors),
            _ => {
                tracing::warn!(subject = %target.subject, pass, "detection failed");
                Err(AlignError::Detection {
                    subject: target.subject,
                    pass,
                })
            }
        }
    };

    let mut anchors = locate(image, 0)?;
    let mut score: StabilizationScore = score_pair(&anchors, &goal, canvas_height);
    let mut cumulative = AlignmentMatrix::IDENTITY;
    let mut current: Option<P::Image> = None;
    let mut last_axis: Option<RefinerAxis> = None;
    let mut log = RunLog::start(settings.mode, score.value);

    tracing::debug!(
        subject = %target.subject,
        initial_score = score.value,
        max_passes,
        "starting pair stabilization"
    );

    let reason = loop {
        if control.is_cancelled() {
            return Err(AlignError::Cancelled);
        }
        if score.value < settings.no_action_score_threshold {
            break EarlyStopReason::ScoreBelowThreshold;
        }
        if log.len() >= max_passes {
            break EarlyStopReason::MaxPassesReached;
        }

        let pass_number = log.len() + 1;
        let pass_started = Instant::now();
        let overshoot = detect_pair_overshoot(
            &anchors,
            &goal,
            score.value,
            settings.no_action_score_threshold,
        );

        let (correction, stage) = match settings.mode {
            StabilizationMode::Slow => {
                let step = RefinementStep::run(&anchors, &goal, settings, Some(&overshoot));
                if step.all_converged() {
                    break last_axis
                        .unwrap_or(RefinerAxis::Translation)
                        .converged_reason();
                }
                if pass_number == 1 {
                    let m = solve_anchor_pair(&anchors, &goal);
                    (
                        overshoot.damp_matrix(&m, &anchors.midpoint()),
                        StabilizationStage::Initial,
                    )
                } else {
                    let axis = step.last_active().unwrap_or(RefinerAxis::Translation);
                    last_axis = Some(axis);
                    (step.matrix(), axis.stage())
                }
            }
            StabilizationMode::Fast => {
                let m = solve_anchor_pair(&anchors, &goal);
                (
                    overshoot.damp_matrix(&m, &anchors.midpoint()),
                    StabilizationStage::Combined,
                )
            }
        };

        let next_matrix = cumulative.then(&correction);
        let next_image = processor.apply_affine(image, &next_matrix, canvas[0], canvas[1])?;
        let next_anchors = locate(&next_image, pass_number)?;
        let next_score = score_pair(&next_anchors, &goal, canvas_height);

        let improved = next_score.value < score.value;
        log.record(StabilizationPass {
            pass_number,
            stage,
            score_before: score.value,
            score_after: next_score.value,
            converged: next_score.value < settings.no_action_score_threshold,
            duration_ms: elapsed_ms(pass_started),
        });
        control.emit(StabilizationProgress {
            pass: pass_number,
            total_passes: max_passes,
            score: next_score.value,
            stage,
        });
        if !improved {
            break EarlyStopReason::NoImprovement;
        }

        cumulative = next_matrix;
        current = Some(next_image);
        anchors = next_anchors;
        score = next_score;
    };

    let result = log.finish(
        score.value,
        Some(reason),
        Some(goal.distance()),
        FrameTransform::Affine(cumulative),
        settings.success_score_threshold,
    );
    let image = match current {
        Some(img) => img,
        None => image.clone(),
    };
    Ok(PairOutcome {
        stabilized: Stabilized { image, result },
        final_anchors: anchors,
    })
}
