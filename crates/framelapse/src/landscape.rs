//! Landscape stabilization: projective alignment onto a reference frame
//! from matched feature keypoints.

use std::cmp::Ordering;
use std::time::Instant;

use crate::api::ContentType;
use crate::capability::{FeatureMatcher, ImageProcessor};
use crate::error::{AlignError, DetectionSubject};
use crate::geometry::{FrameTransform, HomographyMatrix, LandmarkPoint};
use crate::homography::{
    calculate_homography_matrix_with_limits, HomographyLimits, MIN_MATCHES,
};
use crate::landmarks::FeatureMatch;
use crate::settings::{AlignmentSettings, LandscapeSettings};
use crate::stabilize::engine::{elapsed_ms, RunLog};
use crate::stabilize::{
    EarlyStopReason, RunControl, StabilizationPass, StabilizationProgress, StabilizationScore,
    StabilizationStage, Stabilized,
};

/// Outcome of the match-quality refiner.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFilter {
    pub kept: Vec<FeatureMatch>,
    pub dropped: usize,
    pub converged: bool,
}

/// Drop matches whose descriptor distance exceeds `factor × median`.
///
/// Converged when at most `tolerance` of the matches were dropped. A filter
/// that would leave fewer than `min_kept` matches keeps all of them and
/// reports convergence.
pub fn refine_match_quality(
    matches: &[FeatureMatch],
    factor: f32,
    tolerance: f64,
    min_kept: usize,
) -> MatchFilter {
    let distances: Vec<f64> = matches.iter().map(|m| m.distance as f64).collect();
    let Some(median) = median(&distances) else {
        return MatchFilter {
            kept: Vec::new(),
            dropped: 0,
            converged: true,
        };
    };
    let cutoff = median * factor as f64;
    let kept: Vec<FeatureMatch> = matches
        .iter()
        .copied()
        .filter(|m| (m.distance as f64) <= cutoff)
        .collect();
    if kept.len() < min_kept {
        tracing::trace!(
            kept = kept.len(),
            min_kept,
            "match quality refiner would starve the fit, keeping all matches"
        );
        return MatchFilter {
            kept: matches.to_vec(),
            dropped: 0,
            converged: true,
        };
    }
    let dropped = matches.len() - kept.len();
    let converged = dropped as f64 <= tolerance * matches.len() as f64;
    tracing::trace!(kept = kept.len(), dropped, converged, "match quality refiner");
    MatchFilter {
        kept,
        dropped,
        converged,
    }
}

/// Mean displacement (pixels) of the four corners of a `size` canvas under `h`.
///
/// `+∞` when a corner maps to infinity.
pub fn perspective_displacement(h: &HomographyMatrix, size: [u32; 2]) -> f64 {
    let (w, ht) = (size[0] as f64, size[1] as f64);
    let corners = [
        LandmarkPoint::new(0.0, 0.0),
        LandmarkPoint::new(w, 0.0),
        LandmarkPoint::new(w, ht),
        LandmarkPoint::new(0.0, ht),
    ];
    let mut total = 0.0;
    for c in &corners {
        match h.project(c) {
            Some(p) => total += p.distance(c),
            None => return f64::INFINITY,
        }
    }
    total / corners.len() as f64
}

/// Next RANSAC threshold: twice the p95 inlier error, clamped to `[min, current]`.
///
/// Returns the new threshold and whether it moved by less than `tolerance`
/// (relative).
pub fn refine_ransac_threshold(
    current: f64,
    p95_error: f64,
    min_threshold: f64,
    tolerance: f64,
) -> (f64, bool) {
    let proposed = if p95_error.is_finite() {
        2.0 * p95_error
    } else {
        current
    };
    let next = proposed.clamp(min_threshold.min(current), current);
    let converged = (current - next).abs() <= tolerance * current;
    tracing::trace!(current, next, converged, "ransac threshold refiner");
    (next, converged)
}

/// Median spatial distance between matched keypoints, per mille of `canvas_height`.
pub fn landscape_score(
    source: &[[f64; 2]],
    reference: &[[f64; 2]],
    matches: &[FeatureMatch],
    canvas_height: f64,
) -> StabilizationScore {
    let distances: Vec<f64> = matches
        .iter()
        .filter_map(|m| {
            let s = source.get(m.source_index)?;
            let r = reference.get(m.reference_index)?;
            Some((s[0] - r[0]).hypot(s[1] - r[1]))
        })
        .collect();
    let med = median(&distances).unwrap_or(f64::INFINITY);
    let value = if canvas_height.is_finite() && canvas_height > 0.0 {
        med * 1000.0 / canvas_height
    } else {
        f64::INFINITY
    };
    StabilizationScore {
        value,
        left_distance: med,
        right_distance: med,
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LandscapeRefiner {
    MatchQuality,
    Perspective,
    RansacThreshold,
}

impl LandscapeRefiner {
    fn converged_reason(self) -> EarlyStopReason {
        match self {
            Self::MatchQuality => EarlyStopReason::MatchQualityConverged,
            Self::Perspective => EarlyStopReason::PerspectiveStable,
            Self::RansacThreshold => EarlyStopReason::RansacThresholdConverged,
        }
    }
}

/// Keypoints of one image with their matches against the reference.
struct Observation {
    positions: Vec<[f64; 2]>,
    matches: Vec<FeatureMatch>,
}

/// Align `image` onto `reference` with repeated validated homography fits.
pub fn stabilize_landscape<P, M>(
    processor: &P,
    matcher: &M,
    image: &P::Image,
    reference: &P::Image,
    settings: &AlignmentSettings,
    mut control: RunControl<'_>,
) -> Result<Stabilized<P::Image>, AlignError>
where
    P: ImageProcessor,
    M: FeatureMatcher<P::Image> + ?Sized,
{
    if !matcher.is_available() {
        return Err(AlignError::UnsupportedCapability(ContentType::Landscape));
    }
    settings.validate()?;
    let ls: &LandscapeSettings = &settings.landscape;
    let stab = &settings.stabilization;

    let (rw, rh) = processor.dimensions(reference);
    if rw == 0 || rh == 0 {
        return Err(AlignError::invalid("reference image is empty"));
    }
    let canvas = [rw, rh];
    let canvas_height = rh as f64;
    let limits = HomographyLimits::from(ls);
    let max_passes = stab.max_passes();

    let detect_failed = |pass: usize| {
        tracing::warn!(pass, "feature detection failed");
        AlignError::Detection {
            subject: DetectionSubject::Features,
            pass,
        }
    };

    let ref_features = matcher
        .detect_features(reference, ls.detector, ls.max_keypoints)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| detect_failed(0))?;
    let ref_px = ref_features.pixel_positions(rw, rh);

    let observe = |img: &P::Image, pass: usize| -> Result<Observation, AlignError> {
        let (w, h) = processor.dimensions(img);
        let features = matcher
            .detect_features(img, ls.detector, ls.max_keypoints)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| detect_failed(pass))?;
        let matches = matcher.match_features(&features, &ref_features, ls.ratio_threshold);
        if matches.is_empty() {
            return Err(detect_failed(pass));
        }
        Ok(Observation {
            positions: features.pixel_positions(w, h),
            matches,
        })
    };

    let mut obs = observe(image, 0)?;
    let mut score = landscape_score(&obs.positions, &ref_px, &obs.matches, canvas_height);
    let mut cumulative = HomographyMatrix::IDENTITY;
    let mut current: Option<P::Image> = None;
    let mut threshold = ls.ransac_threshold;
    let mut last_active: Option<LandscapeRefiner> = None;
    let mut log = RunLog::start(stab.mode, score.value);

    tracing::debug!(
        keypoints = ref_features.len(),
        matches = obs.matches.len(),
        initial_score = score.value,
        "starting landscape stabilization"
    );

    let reason = loop {
        if control.is_cancelled() {
            return Err(AlignError::Cancelled);
        }
        if score.value < stab.no_action_score_threshold {
            break EarlyStopReason::ScoreBelowThreshold;
        }
        if log.len() >= max_passes {
            break EarlyStopReason::MaxPassesReached;
        }

        let pass_number = log.len() + 1;
        let pass_started = Instant::now();

        let filter = refine_match_quality(
            &obs.matches,
            ls.match_quality_factor,
            ls.match_quality_tolerance,
            MIN_MATCHES,
        );
        let estimate = calculate_homography_matrix_with_limits(
            matcher,
            &obs.positions,
            &ref_px,
            &filter.kept,
            threshold,
            &limits,
        )?;
        let (w, h) = match &current {
            Some(img) => processor.dimensions(img),
            None => processor.dimensions(image),
        };
        let displacement = perspective_displacement(&estimate.matrix, [w, h]);
        let perspective_converged = displacement < ls.perspective_stability_px;
        let (next_threshold, threshold_converged) = refine_ransac_threshold(
            threshold,
            estimate.p95_error,
            ls.min_ransac_threshold,
            ls.ransac_threshold_tolerance,
        );

        if filter.converged && perspective_converged && threshold_converged {
            break last_active
                .unwrap_or(LandscapeRefiner::Perspective)
                .converged_reason();
        }
        last_active = [
            (LandscapeRefiner::RansacThreshold, threshold_converged),
            (LandscapeRefiner::Perspective, perspective_converged),
            (LandscapeRefiner::MatchQuality, filter.converged),
        ]
        .into_iter()
        .find_map(|(refiner, converged)| (!converged).then_some(refiner));

        let next_matrix = cumulative.then(&estimate.matrix);
        let next_image = processor.apply_homography(image, &next_matrix, canvas[0], canvas[1])?;
        let next_obs = observe(&next_image, pass_number)?;
        let next_score =
            landscape_score(&next_obs.positions, &ref_px, &next_obs.matches, canvas_height);

        let improved = next_score.value < score.value;
        log.record(StabilizationPass {
            pass_number,
            stage: StabilizationStage::Homography,
            score_before: score.value,
            score_after: next_score.value,
            converged: next_score.value < stab.no_action_score_threshold,
            duration_ms: elapsed_ms(pass_started),
        });
        tracing::debug!(
            pass = pass_number,
            inliers = estimate.inlier_count,
            kept = filter.kept.len(),
            displacement,
            threshold,
            "landscape pass"
        );
        control.emit(StabilizationProgress {
            pass: pass_number,
            total_passes: max_passes,
            score: next_score.value,
            stage: StabilizationStage::Homography,
        });
        if !improved {
            break EarlyStopReason::NoImprovement;
        }

        cumulative = next_matrix;
        current = Some(next_image);
        obs = next_obs;
        score = next_score;
        threshold = next_threshold;
    };

    let result = log.finish(
        score.value,
        Some(reason),
        None,
        FrameTransform::Projective(cumulative),
        stab.success_score_threshold,
    );
    let image = match current {
        Some(img) => img,
        None => image.clone(),
    };
    Ok(Stabilized { image, result })
}
