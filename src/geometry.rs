//! Axis-aligned box geometry.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// A well-formed box has `x1 < x2` and `y1 < y2`. Boxes that violate this are
/// not rejected; they are treated as zero-area and never overlap anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// True when the box has no positive area (including non-finite coordinates).
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Area of the box, zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            self.width() * self.height()
        }
    }

    pub fn iou(&self, other: &Self) -> f32 {
        iou(self, other)
    }
}

/// Intersection-over-union of two boxes, always within `[0, 1]`.
///
/// Total: disjoint, touching, degenerate or malformed boxes yield `0.0`.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let iw = ix2 - ix1;
    let ih = iy2 - iy1;
    if !(iw > 0.0 && ih > 0.0) {
        return 0.0;
    }

    // A positive intersection implies both boxes have positive area.
    let intersection = iw * ih;
    let union = a.area() + b.area() - intersection;
    if !(union > 0.0) {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}
