//! Content-type dispatch over the injected capabilities.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::body::{align_body, stabilize_muscle};
use crate::capability::{BodyPoseDetector, FaceDetector, FeatureMatcher, ImageProcessor};
use crate::error::AlignError;
use crate::face::align_face;
use crate::geometry::FrameTransform;
use crate::landmarks::MuscleRegion;
use crate::landscape::stabilize_landscape;
use crate::manual::ManualAdjustment;
use crate::settings::AlignmentSettings;
use crate::stabilize::engine::{elapsed_ms, RunLog};
use crate::stabilize::{
    RunControl, StabilizationPass, StabilizationProgress, StabilizationStage, Stabilized,
};

/// What a frame shows, and therefore which stabilizer handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Face,
    Body,
    Muscle(MuscleRegion),
    Landscape,
}

/// One frame to align.
#[derive(Debug)]
pub struct AlignRequest<'r, I> {
    pub frame: &'r I,
    pub content_type: ContentType,
    /// Required for [`ContentType::Landscape`].
    pub reference: Option<&'r I>,
}

impl<'r, I> AlignRequest<'r, I> {
    pub fn new(frame: &'r I, content_type: ContentType) -> Self {
        Self {
            frame,
            content_type,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: &'r I) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Routes frames to the face, body, muscle or landscape stabilizer.
///
/// Detectors are optional; a content type whose capability is missing (or
/// reports itself unavailable) fails with
/// [`AlignError::UnsupportedCapability`] before any pass runs.
pub struct Stabilizer<'a, P: ImageProcessor> {
    processor: P,
    face: Option<&'a dyn FaceDetector<P::Image>>,
    body: Option<&'a dyn BodyPoseDetector<P::Image>>,
    features: Option<&'a dyn FeatureMatcher<P::Image>>,
    settings: AlignmentSettings,
}

impl<'a, P: ImageProcessor> Stabilizer<'a, P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            face: None,
            body: None,
            features: None,
            settings: AlignmentSettings::default(),
        }
    }

    pub fn with_face_detector(mut self, detector: &'a dyn FaceDetector<P::Image>) -> Self {
        self.face = Some(detector);
        self
    }

    pub fn with_body_detector(mut self, detector: &'a dyn BodyPoseDetector<P::Image>) -> Self {
        self.body = Some(detector);
        self
    }

    pub fn with_feature_matcher(mut self, matcher: &'a dyn FeatureMatcher<P::Image>) -> Self {
        self.features = Some(matcher);
        self
    }

    pub fn with_settings(mut self, settings: AlignmentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn settings(&self) -> &AlignmentSettings {
        &self.settings
    }

    pub fn is_available(&self, content_type: ContentType) -> bool {
        match content_type {
            ContentType::Face => self.face.is_some_and(|d| d.is_available()),
            ContentType::Body | ContentType::Muscle(_) => {
                self.body.is_some_and(|d| d.is_available())
            }
            ContentType::Landscape => self.features.is_some_and(|m| m.is_available()),
        }
    }

    /// Align one frame according to its content type.
    pub fn align(
        &self,
        request: AlignRequest<'_, P::Image>,
        control: RunControl<'_>,
    ) -> Result<Stabilized<P::Image>, AlignError> {
        let content_type = request.content_type;
        let unsupported = || {
            tracing::warn!(?content_type, "capability unavailable");
            AlignError::UnsupportedCapability(content_type)
        };
        if !self.is_available(content_type) {
            return Err(unsupported());
        }

        let settings = &self.settings;
        match content_type {
            ContentType::Face => {
                let detector = self.face.ok_or_else(unsupported)?;
                align_face(&self.processor, detector, request.frame, settings, control)
            }
            ContentType::Body => {
                let detector = self.body.ok_or_else(unsupported)?;
                align_body(&self.processor, detector, request.frame, settings, control)
            }
            ContentType::Muscle(region) => {
                let detector = self.body.ok_or_else(unsupported)?;
                stabilize_muscle(
                    &self.processor,
                    detector,
                    request.frame,
                    region,
                    settings,
                    control,
                )
            }
            ContentType::Landscape => {
                let matcher = self.features.ok_or_else(unsupported)?;
                let reference = request.reference.ok_or_else(|| {
                    AlignError::invalid("landscape alignment needs a reference frame")
                })?;
                stabilize_landscape(
                    &self.processor,
                    matcher,
                    request.frame,
                    reference,
                    settings,
                    control,
                )
            }
        }
    }

    /// Apply user-placed landmarks in a single pass, without detection.
    pub fn align_manual(
        &self,
        frame: &P::Image,
        adjustment: &ManualAdjustment,
        mut control: RunControl<'_>,
    ) -> Result<Stabilized<P::Image>, AlignError> {
        self.settings.validate()?;
        if control.is_cancelled() {
            return Err(AlignError::Cancelled);
        }
        let started = Instant::now();
        let (w, h) = self.processor.dimensions(frame);
        let [cw, ch] = self.settings.canvas_size();

        let transform = adjustment.transform([w, h], &self.settings)?;
        let (before, after) = adjustment.scores([w, h], &self.settings, &transform);
        let (image, stage) = match &transform {
            FrameTransform::Affine(m) => (
                self.processor.apply_affine(frame, m, cw, ch)?,
                StabilizationStage::Combined,
            ),
            FrameTransform::Projective(hm) => (
                self.processor.apply_homography(frame, hm, cw, ch)?,
                StabilizationStage::Homography,
            ),
        };

        let stab = &self.settings.stabilization;
        let mut log = RunLog::start(stab.mode, before);
        log.record(StabilizationPass {
            pass_number: 1,
            stage,
            score_before: before,
            score_after: after,
            converged: after < stab.no_action_score_threshold,
            duration_ms: elapsed_ms(started),
        });
        control.emit(StabilizationProgress {
            pass: 1,
            total_passes: 1,
            score: after,
            stage,
        });
        let goal_distance = adjustment
            .anchor_goal([w, h], &self.settings)
            .map(|(_, goal)| goal.distance());
        let result = log.finish(
            after,
            None,
            goal_distance,
            transform,
            stab.success_score_threshold,
        );
        tracing::debug!(content_type = ?adjustment.content_type(), "manual adjustment applied");
        Ok(Stabilized { image, result })
    }
}

impl<P: ImageProcessor + std::fmt::Debug> std::fmt::Debug for Stabilizer<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stabilizer")
            .field("processor", &self.processor)
            .field("face", &self.face.is_some())
            .field("body", &self.body.is_some())
            .field("features", &self.features.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_serde_names() {
        assert_eq!(serde_json::to_string(&ContentType::Face).unwrap(), "\"face\"");
        assert_eq!(
            serde_json::to_string(&ContentType::Muscle(MuscleRegion::Arms)).unwrap(),
            "{\"muscle\":\"arms\"}"
        );
        let back: ContentType = serde_json::from_str("\"landscape\"").unwrap();
        assert_eq!(back, ContentType::Landscape);
    }
}
