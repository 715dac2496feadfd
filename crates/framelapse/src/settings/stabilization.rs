use serde::{Deserialize, Serialize};

use super::SettingsError;

/// Pass budget for the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationMode {
    /// Combined solve per pass, at most [`FAST_PASSES`](Self::FAST_PASSES) passes.
    #[default]
    Fast,
    /// Per-axis refinement, up to `slow_max_passes` passes.
    Slow,
}

impl StabilizationMode {
    pub const FAST_PASSES: usize = 4;
}

/// Convergence and acceptance thresholds for the multi-pass stabilizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationSettings {
    pub mode: StabilizationMode,
    /// Pass budget in [`StabilizationMode::Slow`], never below the FAST budget.
    pub slow_max_passes: usize,
    /// Rotation refiner stops below this residual eye-line angle (degrees).
    pub rotation_stop_threshold: f64,
    /// Scale refiner stops below this relative anchor-distance error.
    pub scale_error_threshold: f64,
    /// Translation refiner stops below this midpoint offset (pixels).
    pub convergence_threshold: f64,
    /// Final score below this is a successful alignment.
    pub success_score_threshold: f64,
    /// Score below this needs no correction at all.
    pub no_action_score_threshold: f64,
}

impl Default for StabilizationSettings {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::Fast,
            slow_max_passes: 10,
            rotation_stop_threshold: 0.1,
            scale_error_threshold: 0.001,
            convergence_threshold: 0.5,
            success_score_threshold: 20.0,
            no_action_score_threshold: 0.5,
        }
    }
}

impl StabilizationSettings {
    pub fn fast() -> Self {
        Self::default()
    }

    pub fn slow() -> Self {
        Self {
            mode: StabilizationMode::Slow,
            ..Self::default()
        }
    }

    pub fn max_passes(&self) -> usize {
        match self.mode {
            StabilizationMode::Fast => StabilizationMode::FAST_PASSES,
            StabilizationMode::Slow => self.slow_max_passes,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.slow_max_passes < StabilizationMode::FAST_PASSES {
            return Err(SettingsError::invalid(format!(
                "slow_max_passes must be at least {}, got {}",
                StabilizationMode::FAST_PASSES,
                self.slow_max_passes
            )));
        }
        for (name, value) in [
            ("rotation_stop_threshold", self.rotation_stop_threshold),
            ("scale_error_threshold", self.scale_error_threshold),
            ("convergence_threshold", self.convergence_threshold),
            ("success_score_threshold", self.success_score_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::invalid(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !(self.no_action_score_threshold.is_finite() && self.no_action_score_threshold >= 0.0) {
            return Err(SettingsError::invalid(
                "no_action_score_threshold must be finite and non-negative",
            ));
        }
        if self.no_action_score_threshold > self.success_score_threshold {
            return Err(SettingsError::invalid(
                "no_action_score_threshold must not exceed success_score_threshold",
            ));
        }
        Ok(())
    }
}
