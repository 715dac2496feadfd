use serde::{Deserialize, Serialize};

use crate::geometry::FrameTransform;
use crate::settings::StabilizationMode;

/// What a pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationStage {
    /// First pass of a SLOW run (combined solve).
    Initial,
    /// FAST pass (combined solve with overshoot damping).
    Combined,
    Rotation,
    Scale,
    Translation,
    Homography,
}

/// Why the pass loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EarlyStopReason {
    ScoreBelowThreshold,
    NoImprovement,
    MaxPassesReached,
    RotationConverged,
    ScaleConverged,
    TranslationConverged,
    MatchQualityConverged,
    RansacThresholdConverged,
    PerspectiveStable,
    FaceDetectionFailed,
    BodyDetectionFailed,
    FeatureDetectionFailed,
}

/// One iteration of the pass loop. Append-only within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizationPass {
    /// 1-based.
    pub pass_number: usize,
    pub stage: StabilizationStage,
    pub score_before: f64,
    pub score_after: f64,
    /// `score_after` fell below the no-action threshold.
    pub converged: bool,
    pub duration_ms: u64,
}

impl StabilizationPass {
    pub fn improvement(&self) -> f64 {
        self.score_before - self.score_after
    }
}

/// Terminal aggregate of one alignment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizationResult {
    pub success: bool,
    pub mode: StabilizationMode,
    pub initial_score: f64,
    pub final_score: f64,
    /// Equals `passes.len()`; a final pass rejected for not improving counts.
    pub passes_executed: usize,
    pub passes: Vec<StabilizationPass>,
    pub early_stop_reason: Option<EarlyStopReason>,
    pub total_duration_ms: u64,
    /// Goal anchor distance in canvas pixels; `None` for landscape frames.
    pub goal_eye_distance: Option<f64>,
    /// Cumulative transform from the input frame onto the canvas.
    pub transform: FrameTransform,
    pub confidence: f32,
}

impl StabilizationResult {
    pub fn improvement(&self) -> f64 {
        self.initial_score - self.final_score
    }
}

/// Aligned image plus its telemetry.
#[derive(Debug, Clone)]
pub struct Stabilized<I> {
    pub image: I,
    pub result: StabilizationResult,
}

/// Emitted once per completed pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizationProgress {
    pub pass: usize,
    pub total_passes: usize,
    pub score: f64,
    pub stage: StabilizationStage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reasons_serialize_screaming_snake() {
        let json = serde_json::to_string(&EarlyStopReason::ScoreBelowThreshold).unwrap();
        assert_eq!(json, "\"SCORE_BELOW_THRESHOLD\"");
        let back: EarlyStopReason = serde_json::from_str("\"RANSAC_THRESHOLD_CONVERGED\"").unwrap();
        assert_eq!(back, EarlyStopReason::RansacThresholdConverged);
    }
}
