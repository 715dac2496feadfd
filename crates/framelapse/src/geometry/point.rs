use serde::{Deserialize, Serialize};

/// A 2D landmark with an optional depth component.
///
/// Detectors report points normalized to `[0, 1]` relative to the image they
/// were given; the stabilizers work in pixel space. `z` is carried through
/// untouched and never used for 2D alignment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl LandmarkPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub const fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the xy-plane.
    pub fn distance(&self, other: &LandmarkPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &LandmarkPoint) -> LandmarkPoint {
        LandmarkPoint::with_z(
            0.5 * (self.x + other.x),
            0.5 * (self.y + other.y),
            0.5 * (self.z + other.z),
        )
    }

    /// Scale a normalized point into pixel coordinates of a `width × height` image.
    pub fn to_pixels(self, width: u32, height: u32) -> LandmarkPoint {
        LandmarkPoint::with_z(self.x * width as f64, self.y * height as f64, self.z)
    }

    /// Inverse of [`to_pixels`](Self::to_pixels). Zero-sized images map to the origin.
    pub fn to_normalized(self, width: u32, height: u32) -> LandmarkPoint {
        let w = if width == 0 { f64::INFINITY } else { width as f64 };
        let h = if height == 0 { f64::INFINITY } else { height as f64 };
        LandmarkPoint::with_z(self.x / w, self.y / h, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn xy(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for LandmarkPoint {
    fn from(p: [f64; 2]) -> Self {
        LandmarkPoint::new(p[0], p[1])
    }
}

/// Axis-aligned box, in the same coordinate space as the landmarks it bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> LandmarkPoint {
        LandmarkPoint::new(
            0.5 * (self.left + self.right),
            0.5 * (self.top + self.bottom),
        )
    }

    pub fn top_center(&self) -> LandmarkPoint {
        LandmarkPoint::new(0.5 * (self.left + self.right), self.top)
    }

    pub fn bottom_center(&self) -> LandmarkPoint {
        LandmarkPoint::new(0.5 * (self.left + self.right), self.bottom)
    }

    pub fn contains(&self, p: &LandmarkPoint) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    pub fn to_pixels(self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        BoundingBox::new(self.left * w, self.top * h, self.right * w, self.bottom * h)
    }
}

/// Two pixel-space anchors driven onto a goal pair by the pair stabilizer.
///
/// For faces these are the eye centers, for bodies the shoulders or hips, and
/// for the full-body muscle region the neck → hip-midpoint torso axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorPair {
    pub left: LandmarkPoint,
    pub right: LandmarkPoint,
}

impl AnchorPair {
    pub const fn new(left: LandmarkPoint, right: LandmarkPoint) -> Self {
        Self { left, right }
    }

    pub fn midpoint(&self) -> LandmarkPoint {
        self.left.midpoint(&self.right)
    }

    pub fn distance(&self) -> f64 {
        self.left.distance(&self.right)
    }

    /// Direction of the `left → right` vector, in radians.
    pub fn angle(&self) -> f64 {
        (self.right.y - self.left.y).atan2(self.right.x - self.left.x)
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }

    pub fn map(&self, f: impl Fn(&LandmarkPoint) -> LandmarkPoint) -> AnchorPair {
        AnchorPair::new(f(&self.left), f(&self.right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_roundtrip_preserves_depth() {
        let p = LandmarkPoint::with_z(0.25, 0.75, 0.3);
        let px = p.to_pixels(640, 480);
        assert_relative_eq!(px.x, 160.0);
        assert_relative_eq!(px.y, 360.0);
        let back = px.to_normalized(640, 480);
        assert_relative_eq!(back.x, 0.25);
        assert_relative_eq!(back.y, 0.75);
        assert_relative_eq!(back.z, 0.3);
    }

    #[test]
    fn anchor_pair_geometry() {
        let pair = AnchorPair::new(LandmarkPoint::new(0.0, 0.0), LandmarkPoint::new(3.0, 4.0));
        assert_relative_eq!(pair.distance(), 5.0);
        assert_relative_eq!(pair.midpoint().x, 1.5);
        assert_relative_eq!(pair.angle(), (4.0f64).atan2(3.0));
    }
}
