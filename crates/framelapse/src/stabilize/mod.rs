//! Multi-pass stabilization: scoring, overshoot damping, affine solves,
//! per-axis refiners and the pass loop they feed.

mod control;
pub(crate) mod engine;
mod overshoot;
mod refine;
mod result;
mod score;
mod solve;

pub use control::{CancellationToken, RunControl};
pub use overshoot::{detect_overshoot, OvershootCorrection};
pub use refine::{
    refine_rotation, refine_scale, refine_translation, AxisRefinement, RefinementStep, RefinerAxis,
};
pub use result::{
    EarlyStopReason, StabilizationPass, StabilizationProgress, StabilizationResult,
    StabilizationStage, Stabilized,
};
pub use score::{calculate_score, score_confidence, StabilizationScore};
pub use solve::{calculate_alignment_matrix, solve_pair_alignment};

pub(crate) use overshoot::detect_pair_overshoot;
pub(crate) use score::score_pair;
pub(crate) use solve::{angle_between, solve_anchor_pair};
