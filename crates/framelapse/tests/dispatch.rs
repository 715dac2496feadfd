mod common;

use approx::assert_relative_eq;
use common::{
    face_frame, scene_points, shifted, EyeDetector, IndexMatcher, PoseDetector, SyntheticFrame,
    SyntheticProcessor,
};
use framelapse::{
    AlignError, AlignRequest, AlignmentSettings, AnchorPair, ContentType, EarlyStopReason,
    FrameTransform, LandmarkPoint, ManualAdjustment, MuscleRegion, RunControl, Stabilizer,
};

fn settings() -> AlignmentSettings {
    AlignmentSettings {
        output_size: 1000,
        ..Default::default()
    }
}

#[test]
fn availability_follows_injected_capabilities() {
    let face = EyeDetector::new();
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_face_detector(&face);
    assert!(stabilizer.is_available(ContentType::Face));
    assert!(!stabilizer.is_available(ContentType::Body));
    assert!(!stabilizer.is_available(ContentType::Muscle(MuscleRegion::Arms)));
    assert!(!stabilizer.is_available(ContentType::Landscape));

    let off = EyeDetector::unavailable();
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_face_detector(&off);
    assert!(!stabilizer.is_available(ContentType::Face));
}

#[test]
fn missing_capability_is_unsupported_without_passes() {
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_settings(settings());
    let frame = face_frame([450.0, 400.0], [750.0, 400.0]);
    let err = stabilizer
        .align(AlignRequest::new(&frame, ContentType::Body), RunControl::new())
        .unwrap_err();
    assert!(matches!(err, AlignError::UnsupportedCapability(ContentType::Body)));
    assert_eq!(stabilizer.processor().warp_count(), 0);
}

#[test]
fn face_request_is_routed_to_face_alignment() {
    let face = EyeDetector::new();
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact())
        .with_face_detector(&face)
        .with_settings(settings());
    let frame = face_frame([300.0, 500.0], [690.0, 300.0]);
    let out = stabilizer
        .align(AlignRequest::new(&frame, ContentType::Face), RunControl::new())
        .unwrap();
    assert!(out.result.success);
    assert_relative_eq!(out.image.points[0].x, 350.0, epsilon = 1e-6);
    assert_eq!(face.calls(), 2);
}

#[test]
fn muscle_request_uses_region_anchor() {
    let body = PoseDetector::default();
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact())
        .with_body_detector(&body)
        .with_settings(settings());
    let frame = SyntheticFrame::new(
        1000,
        1000,
        &[[300.0, 340.0], [700.0, 300.0], [380.0, 600.0], [600.0, 600.0]],
    );
    let out = stabilizer
        .align(
            AlignRequest::new(&frame, ContentType::Muscle(MuscleRegion::UpperBody)),
            RunControl::new(),
        )
        .unwrap();
    let goal = stabilizer
        .settings()
        .body
        .region_goal(MuscleRegion::UpperBody, 1000);
    assert_relative_eq!(out.image.points[0].x, goal.left.x, epsilon = 1e-6);
    assert_relative_eq!(out.image.points[1].y, goal.right.y, epsilon = 1e-6);
}

#[test]
fn landscape_needs_a_reference() {
    let matcher = IndexMatcher::default();
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_feature_matcher(&matcher);
    let frame = SyntheticFrame::new(800, 600, &scene_points());
    let err = stabilizer
        .align(AlignRequest::new(&frame, ContentType::Landscape), RunControl::new())
        .unwrap_err();
    assert!(matches!(err, AlignError::InvalidInput(_)));

    let reference = SyntheticFrame::new(800, 600, &shifted(&scene_points(), -15.0, 10.0));
    let out = stabilizer
        .align(
            AlignRequest::new(&frame, ContentType::Landscape).with_reference(&reference),
            RunControl::new(),
        )
        .unwrap();
    assert!(out.result.success);
    assert!(matches!(out.result.transform, FrameTransform::Projective(_)));
}

#[test]
fn manual_face_adjustment_runs_one_pass() {
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_settings(settings());
    let frame = face_frame([300.0, 500.0], [690.0, 300.0]);
    let adjustment = ManualAdjustment::Face {
        left_eye: LandmarkPoint::new(0.30, 0.50),
        right_eye: LandmarkPoint::new(0.69, 0.30),
        nose_tip: Some(LandmarkPoint::new(0.5, 0.45)),
    };
    let out = stabilizer
        .align_manual(&frame, &adjustment, RunControl::new())
        .unwrap();

    let r = &out.result;
    assert!(r.success);
    assert_eq!(r.passes_executed, 1);
    assert_eq!(r.early_stop_reason, None);
    assert!(r.initial_score > 100.0);
    assert!(r.final_score < 1e-6);
    assert_relative_eq!(out.image.points[1].x, 650.0, epsilon = 1e-6);
    assert_relative_eq!(out.image.points[1].y, 400.0, epsilon = 1e-6);
    assert_eq!(stabilizer.processor().warp_count(), 1);
}

#[test]
fn manual_landscape_adjustment_fills_canvas() {
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_settings(settings());
    let corners = [[80.0, 60.0], [720.0, 40.0], [760.0, 560.0], [40.0, 580.0]];
    let frame = SyntheticFrame::new(800, 600, &corners);
    let adjustment = ManualAdjustment::Landscape {
        corners: corners.map(|c| LandmarkPoint::new(c[0] / 800.0, c[1] / 600.0)),
    };
    let out = stabilizer
        .align_manual(&frame, &adjustment, RunControl::new())
        .unwrap();

    assert!(out.result.final_score < 1e-6);
    let expected = [[0.0, 0.0], [1000.0, 0.0], [1000.0, 1000.0], [0.0, 1000.0]];
    for (p, e) in out.image.points.iter().zip(expected) {
        assert_relative_eq!(p.x, e[0], epsilon = 1e-6);
        assert_relative_eq!(p.y, e[1], epsilon = 1e-6);
    }
}

#[test]
fn manual_body_rejects_coincident_shoulders() {
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_settings(settings());
    let frame = face_frame([300.0, 500.0], [690.0, 300.0]);
    let p = LandmarkPoint::new(0.5, 0.3);
    let adjustment = ManualAdjustment::Body {
        shoulders: AnchorPair::new(p, p),
        hips: AnchorPair::new(LandmarkPoint::new(0.4, 0.6), LandmarkPoint::new(0.6, 0.6)),
    };
    let err = stabilizer
        .align_manual(&frame, &adjustment, RunControl::new())
        .unwrap_err();
    assert!(matches!(err, AlignError::InvalidInput(_)));
    assert_eq!(stabilizer.processor().warp_count(), 0);
}

#[test]
fn detection_failure_reason_is_exposed() {
    let face = EyeDetector::failing_on_call(1);
    let stabilizer = Stabilizer::new(SyntheticProcessor::exact()).with_face_detector(&face);
    let frame = face_frame([450.0, 400.0], [750.0, 400.0]);
    let err = stabilizer
        .align(AlignRequest::new(&frame, ContentType::Face), RunControl::new())
        .unwrap_err();
    assert_eq!(err.early_stop_reason(), Some(EarlyStopReason::FaceDetectionFailed));
}
