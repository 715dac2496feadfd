//! Synthetic frames and fake capabilities for scenario tests.
//!
//! A [`SyntheticFrame`] is a bag of pixel-space points; warping maps the
//! points, and the fake detectors read them back as landmarks.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use framelapse::{
    AlignmentMatrix, BodyLandmarks, BodyPoseDetector, BoundingBox, CropRect, FaceDetector,
    FaceLandmarks, FeatureDetectorKind, FeatureKeypoint, FeatureMatch, FeatureMatcher,
    HomographyMatrix, HomographySolver, ImageProcessor, LandmarkPoint, LandscapeFeatures,
    ProcessingError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel coordinates.
    pub points: Vec<LandmarkPoint>,
}

impl SyntheticFrame {
    pub fn new(width: u32, height: u32, points: &[[f64; 2]]) -> Self {
        Self {
            width,
            height,
            points: points.iter().map(|&p| LandmarkPoint::from(p)).collect(),
        }
    }

    fn normalized(&self, i: usize) -> Option<LandmarkPoint> {
        self.points
            .get(i)
            .map(|p| p.to_normalized(self.width, self.height))
    }
}

/// Warps points with `I + gain · (M − I)`: a gain below 1 under-corrects,
/// which makes convergence take several passes.
#[derive(Debug)]
pub struct SyntheticProcessor {
    pub gain: f64,
    pub warps: AtomicUsize,
}

impl SyntheticProcessor {
    pub fn exact() -> Self {
        Self::with_gain(1.0)
    }

    pub fn with_gain(gain: f64) -> Self {
        Self {
            gain,
            warps: AtomicUsize::new(0),
        }
    }

    pub fn warp_count(&self) -> usize {
        self.warps.load(Ordering::SeqCst)
    }

    fn damped(&self, rows: [[f64; 3]; 3]) -> HomographyMatrix {
        let mut out = [[0.0; 3]; 3];
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                let id = if r == c { 1.0 } else { 0.0 };
                out[r][c] = id + self.gain * (v - id);
            }
        }
        HomographyMatrix::new(out)
    }

    fn warp(
        &self,
        frame: &SyntheticFrame,
        h: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> Result<SyntheticFrame, ProcessingError> {
        self.warps.fetch_add(1, Ordering::SeqCst);
        let effective = self.damped(h.rows);
        let points = frame
            .points
            .iter()
            .map(|p| {
                effective
                    .project(p)
                    .ok_or_else(|| ProcessingError::Transform("point at infinity".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SyntheticFrame {
            width,
            height,
            points,
        })
    }
}

impl ImageProcessor for SyntheticProcessor {
    type Image = SyntheticFrame;

    fn dimensions(&self, image: &SyntheticFrame) -> (u32, u32) {
        (image.width, image.height)
    }

    fn apply_affine(
        &self,
        image: &SyntheticFrame,
        matrix: &AlignmentMatrix,
        width: u32,
        height: u32,
    ) -> Result<SyntheticFrame, ProcessingError> {
        self.warp(image, &HomographyMatrix::from_affine(matrix), width, height)
    }

    fn apply_homography(
        &self,
        image: &SyntheticFrame,
        matrix: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> Result<SyntheticFrame, ProcessingError> {
        self.warp(image, matrix, width, height)
    }

    fn crop(
        &self,
        image: &SyntheticFrame,
        rect: CropRect,
    ) -> Result<SyntheticFrame, ProcessingError> {
        let shift = AlignmentMatrix::translation(-(rect.x as f64), -(rect.y as f64));
        self.warp(image, &HomographyMatrix::from_affine(&shift), rect.width, rect.height)
    }

    fn resize(
        &self,
        image: &SyntheticFrame,
        width: u32,
        height: u32,
    ) -> Result<SyntheticFrame, ProcessingError> {
        let sx = width as f64 / image.width as f64;
        let sy = height as f64 / image.height as f64;
        let m = AlignmentMatrix::new(sx, 0.0, 0.0, 0.0, sy, 0.0);
        self.warp(image, &HomographyMatrix::from_affine(&m), width, height)
    }

    fn load(&self, path: &Path) -> Result<SyntheticFrame, ProcessingError> {
        let text = std::fs::read_to_string(path).map_err(|e| ProcessingError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ProcessingError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn save(&self, image: &SyntheticFrame, path: &Path) -> Result<(), ProcessingError> {
        let text = serde_json::to_string(image).map_err(|e| ProcessingError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Reads `points[0]` / `points[1]` as the left / right eye centers.
#[derive(Debug, Default)]
pub struct EyeDetector {
    calls: AtomicUsize,
    /// 1-based call number that returns no face.
    pub fail_on_call: Option<usize>,
    /// Report these normalized eyes regardless of the frame.
    pub stuck: Option<[LandmarkPoint; 2]>,
    /// Normalized eyes reported on call `n` (1-based) from `script[n - 1]`.
    pub script: Vec<[LandmarkPoint; 2]>,
    pub unavailable: bool,
}

impl EyeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::default()
        }
    }

    pub fn stuck_at(left: LandmarkPoint, right: LandmarkPoint) -> Self {
        Self {
            stuck: Some([left, right]),
            ..Self::default()
        }
    }

    pub fn scripted(script: Vec<[LandmarkPoint; 2]>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector<SyntheticFrame> for EyeDetector {
    fn detect_face(
        &self,
        image: &SyntheticFrame,
        _width: u32,
        _height: u32,
    ) -> Option<FaceLandmarks> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return None;
        }
        let [left, right] = match (self.script.get(call - 1), self.stuck) {
            (Some(&eyes), _) | (None, Some(eyes)) => eyes,
            (None, None) => [image.normalized(0)?, image.normalized(1)?],
        };
        Some(FaceLandmarks::new(
            left,
            right,
            left.midpoint(&right),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        ))
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

/// Reads shoulders from `points[0..2]` and hips from `points[2..4]`.
#[derive(Debug)]
pub struct PoseDetector {
    pub confidence: f32,
}

impl Default for PoseDetector {
    fn default() -> Self {
        Self { confidence: 0.9 }
    }
}

impl BodyPoseDetector<SyntheticFrame> for PoseDetector {
    fn detect_body(
        &self,
        image: &SyntheticFrame,
        _width: u32,
        _height: u32,
    ) -> Option<BodyLandmarks> {
        let left_shoulder = image.normalized(0)?;
        let right_shoulder = image.normalized(1)?;
        Some(BodyLandmarks {
            left_shoulder,
            right_shoulder,
            left_hip: image.normalized(2)?,
            right_hip: image.normalized(3)?,
            neck_center: left_shoulder.midpoint(&right_shoulder),
            bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            confidence: self.confidence,
        })
    }
}

/// Every frame point is a keypoint; keypoint `i` matches reference keypoint `i`.
#[derive(Debug, Default)]
pub struct IndexMatcher {
    pub unavailable: bool,
    /// Descriptor distance of match `i`; 10 past the end.
    pub distances: Vec<f32>,
    /// Apply `distances` only to the first this-many matching rounds; 0 means always.
    pub noisy_rounds: usize,
    pub rounds: AtomicUsize,
}

impl IndexMatcher {
    pub fn with_distances(distances: &[f32]) -> Self {
        Self {
            distances: distances.to_vec(),
            ..Self::default()
        }
    }

    pub fn noisy_for(mut self, rounds: usize) -> Self {
        self.noisy_rounds = rounds;
        self
    }
}

impl HomographySolver for IndexMatcher {}

impl FeatureMatcher<SyntheticFrame> for IndexMatcher {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn detect_features(
        &self,
        image: &SyntheticFrame,
        kind: FeatureDetectorKind,
        max_keypoints: usize,
    ) -> Option<LandscapeFeatures> {
        let keypoints: Vec<FeatureKeypoint> = (0..image.points.len().min(max_keypoints))
            .filter_map(|i| image.normalized(i))
            .map(FeatureKeypoint::at)
            .collect();
        (!keypoints.is_empty()).then_some(LandscapeFeatures {
            keypoints,
            detector: kind,
        })
    }

    fn match_features(
        &self,
        source: &LandscapeFeatures,
        reference: &LandscapeFeatures,
        _ratio_threshold: f32,
    ) -> Vec<FeatureMatch> {
        let round = self.rounds.fetch_add(1, Ordering::SeqCst) + 1;
        let noisy = self.noisy_rounds == 0 || round <= self.noisy_rounds;
        (0..source.len().min(reference.len()))
            .map(|i| {
                let distance = match self.distances.get(i) {
                    Some(&d) if noisy => d,
                    _ => 10.0,
                };
                FeatureMatch::new(i, i, distance)
            })
            .collect()
    }
}

pub fn face_frame(left: [f64; 2], right: [f64; 2]) -> SyntheticFrame {
    SyntheticFrame::new(1000, 1000, &[left, right])
}

/// Non-collinear scene points for landscape tests.
pub fn scene_points() -> Vec<[f64; 2]> {
    vec![
        [100.0, 80.0],
        [640.0, 90.0],
        [700.0, 500.0],
        [120.0, 520.0],
        [400.0, 300.0],
        [250.0, 180.0],
        [520.0, 220.0],
        [330.0, 430.0],
        [600.0, 380.0],
        [180.0, 350.0],
        [450.0, 120.0],
        [560.0, 470.0],
    ]
}

pub fn shifted(points: &[[f64; 2]], dx: f64, dy: f64) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p[0] + dx, p[1] + dy]).collect()
}
