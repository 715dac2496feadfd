//! Error types returned across the alignment boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ContentType;
use crate::homography::HomographyError;
use crate::stabilize::EarlyStopReason;

/// Which detector produced (or failed to produce) landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSubject {
    Face,
    Body,
    Features,
}

impl DetectionSubject {
    pub fn failure_reason(self) -> EarlyStopReason {
        match self {
            Self::Face => EarlyStopReason::FaceDetectionFailed,
            Self::Body => EarlyStopReason::BodyDetectionFailed,
            Self::Features => EarlyStopReason::FeatureDetectionFailed,
        }
    }
}

impl std::fmt::Display for DetectionSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Face => f.write_str("face"),
            Self::Body => f.write_str("body"),
            Self::Features => f.write_str("features"),
        }
    }
}

/// Failure reported by an [`ImageProcessor`](crate::ImageProcessor).
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("failed to save {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Alignment finished (or a fit was computed) but the outcome is not trustworthy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("homography is singular or non-finite")]
    Singular,

    #[error("homography determinant {determinant:.4} outside [{min}, {max}]")]
    DeterminantOutOfRange { determinant: f64, min: f64, max: f64 },

    #[error("unreliable fit: {inliers}/{matches} inliers (ratio {ratio:.3} < {min_ratio})")]
    UnreliableFit {
        inliers: usize,
        matches: usize,
        ratio: f64,
        min_ratio: f64,
    },

    #[error("homography fit failed: {0}")]
    FitFailed(#[from] HomographyError),

    #[error("landmark sanity check failed: {0}")]
    LandmarkSanity(String),
}

/// Top-level alignment error.
#[derive(Debug, Error)]
pub enum AlignError {
    /// No landmarks on the image seen at `pass` (0 is the input frame).
    #[error("{subject} detection failed at pass {pass}")]
    Detection { subject: DetectionSubject, pass: usize },

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("{0:?} alignment is not available on this platform")]
    UnsupportedCapability(ContentType),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("alignment cancelled")]
    Cancelled,
}

impl AlignError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stop reason carried by detection failures.
    pub fn early_stop_reason(&self) -> Option<EarlyStopReason> {
        match self {
            Self::Detection { subject, .. } => Some(subject.failure_reason()),
            _ => None,
        }
    }
}

impl From<crate::settings::SettingsError> for AlignError {
    fn from(e: crate::settings::SettingsError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}
