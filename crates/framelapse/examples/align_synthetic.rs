//! Align a synthetic portrait whose "eyes" are two bright discs.
//!
//! Usage: `cargo run --example align_synthetic [output.png]`

use std::path::PathBuf;

use framelapse::{
    AlignRequest, AlignmentSettings, BoundingBox, ContentType, FaceDetector, FaceLandmarks,
    ImageBufferProcessor, ImageProcessor, LandmarkPoint, RunControl, StabilizationProgress,
    StabilizationSettings, Stabilizer,
};
use image::{Rgba, RgbaImage};

/// Eye centers as the centroids of bright pixels left and right of the
/// bright-pixel median x.
struct BrightSpotDetector;

impl FaceDetector<RgbaImage> for BrightSpotDetector {
    fn detect_face(&self, image: &RgbaImage, width: u32, height: u32) -> Option<FaceLandmarks> {
        let bright: Vec<(f64, f64)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 200)
            .map(|(x, y, _)| (x as f64, y as f64))
            .collect();
        if bright.len() < 2 {
            return None;
        }
        let mut xs: Vec<f64> = bright.iter().map(|p| p.0).collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        let split = xs[xs.len() / 2];
        let centroid = |pick: &dyn Fn(f64) -> bool| {
            let pts: Vec<&(f64, f64)> = bright.iter().filter(|p| pick(p.0)).collect();
            if pts.is_empty() {
                return None;
            }
            let n = pts.len() as f64;
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
            Some(LandmarkPoint::new(sx / n, sy / n).to_normalized(width, height))
        };
        let left = centroid(&|x| x < split)?;
        let right = centroid(&|x| x >= split)?;
        Some(FaceLandmarks::new(
            left,
            right,
            left.midpoint(&right),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        ))
    }
}

fn portrait(size: u32, eyes: [[f64; 2]; 2], radius: f64) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let lit = eyes.iter().any(|e| {
            let (dx, dy) = (x as f64 - e[0], y as f64 - e[1]);
            dx * dx + dy * dy <= radius * radius
        });
        if lit {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([40, 40, 40, 255])
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("framelapse_aligned.png"));

    let frame = portrait(800, [[260.0, 420.0], [530.0, 300.0]], 8.0);
    let detector = BrightSpotDetector;
    let settings = AlignmentSettings {
        output_size: 800,
        stabilization: StabilizationSettings::slow(),
        ..Default::default()
    };
    let stabilizer = Stabilizer::new(ImageBufferProcessor::new())
        .with_face_detector(&detector)
        .with_settings(settings);

    let mut report = |p: &StabilizationProgress| {
        tracing::info!("pass {}/{} ({:?}): score {:.3}", p.pass, p.total_passes, p.stage, p.score);
    };
    let aligned = stabilizer.align(
        AlignRequest::new(&frame, ContentType::Face),
        RunControl::new().with_progress(&mut report),
    )?;

    let r = &aligned.result;
    tracing::info!(
        "success={} passes={} score {:.3} -> {:.3} (confidence {:.2}, stop {:?})",
        r.success,
        r.passes_executed,
        r.initial_score,
        r.final_score,
        r.confidence,
        r.early_stop_reason
    );
    stabilizer.processor().save(&aligned.image, &output)?;
    tracing::info!("Wrote {}", output.display());
    Ok(())
}
