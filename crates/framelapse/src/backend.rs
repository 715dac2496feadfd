//! [`ImageProcessor`] over in-memory RGBA buffers.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::capability::{CropRect, ImageProcessor};
use crate::error::ProcessingError;
use crate::geometry::{AlignmentMatrix, HomographyMatrix};

/// Reference backend: bilinear warps via `imageproc`, I/O via `image`.
///
/// Pixels outside the source land as `fill` (transparent black by default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBufferProcessor {
    pub fill: Rgba<u8>,
    pub resize_filter: FilterType,
}

impl Default for ImageBufferProcessor {
    fn default() -> Self {
        Self {
            fill: Rgba([0, 0, 0, 0]),
            resize_filter: FilterType::Triangle,
        }
    }
}

impl ImageBufferProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn warp(
        &self,
        image: &RgbaImage,
        rows: [f64; 9],
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ProcessingError> {
        if width == 0 || height == 0 {
            return Err(ProcessingError::Transform(format!(
                "empty output canvas {width}x{height}"
            )));
        }
        let projection = Projection::from_matrix(rows.map(|v| v as f32)).ok_or_else(|| {
            ProcessingError::Transform("transform is not invertible".to_string())
        })?;
        let mut out = RgbaImage::from_pixel(width, height, self.fill);
        warp_into(image, &projection, Interpolation::Bilinear, self.fill, &mut out);
        Ok(out)
    }
}

impl ImageProcessor for ImageBufferProcessor {
    type Image = RgbaImage;

    fn dimensions(&self, image: &RgbaImage) -> (u32, u32) {
        image.dimensions()
    }

    fn apply_affine(
        &self,
        image: &RgbaImage,
        matrix: &AlignmentMatrix,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ProcessingError> {
        if !matrix.is_finite() {
            return Err(ProcessingError::Transform("non-finite affine matrix".into()));
        }
        let [a, b, tx, c, d, ty] = matrix.to_row_major();
        self.warp(image, [a, b, tx, c, d, ty, 0.0, 0.0, 1.0], width, height)
    }

    fn apply_homography(
        &self,
        image: &RgbaImage,
        matrix: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ProcessingError> {
        if !matrix.is_valid() {
            return Err(ProcessingError::Transform("degenerate homography".into()));
        }
        self.warp(image, matrix.normalized().to_row_major(), width, height)
    }

    fn crop(&self, image: &RgbaImage, rect: CropRect) -> Result<RgbaImage, ProcessingError> {
        let (w, h) = image.dimensions();
        let fits = rect.width > 0
            && rect.height > 0
            && rect.x.checked_add(rect.width).is_some_and(|r| r <= w)
            && rect.y.checked_add(rect.height).is_some_and(|b| b <= h);
        if !fits {
            return Err(ProcessingError::Transform(format!(
                "crop {rect:?} outside {w}x{h} image"
            )));
        }
        Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
    }

    fn resize(
        &self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ProcessingError> {
        if width == 0 || height == 0 {
            return Err(ProcessingError::Transform(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        Ok(imageops::resize(image, width, height, self.resize_filter))
    }

    fn load(&self, path: &Path) -> Result<RgbaImage, ProcessingError> {
        let img = image::open(path).map_err(|e| ProcessingError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(img.to_rgba8())
    }

    fn save(&self, image: &RgbaImage, path: &Path) -> Result<(), ProcessingError> {
        image.save(path).map_err(|e| ProcessingError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
