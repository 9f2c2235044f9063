//! Decoded video frames.
//!
//! A `Frame` is produced by a frame source, handed to the detector, and may be
//! borrowed by the artifact store when the pipeline requests a capture. It is
//! dropped once the frame has been fully processed.

use anyhow::{anyhow, Result};
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use std::time::Duration;

use crate::geometry::BoundingBox;

const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const HIGHLIGHT_THICKNESS: u32 = 2;

/// One decoded RGB24 frame.
pub struct Frame {
    /// 1-based position of the frame within the session.
    pub index: u64,
    /// Frame time (media time for files, elapsed wall time for live sources).
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(
        index: u64,
        timestamp: Duration,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            index,
            timestamp,
            width,
            height,
            pixels,
        })
    }

    pub fn from_image(index: u64, timestamp: Duration, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index,
            timestamp,
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame {} has an invalid pixel buffer", self.index))
    }

    /// Crop `region` (clamped to the frame) and resize it to `size`.
    pub fn crop(&self, region: &BoundingBox, size: (u32, u32)) -> Result<RgbImage> {
        let (x, y, w, h) = self
            .clamp_region(region)
            .ok_or_else(|| anyhow!("crop region lies outside frame {}", self.index))?;
        let image = self.to_image()?;
        let cropped = imageops::crop_imm(&image, x, y, w, h).to_image();
        if size.0 == 0 || size.1 == 0 {
            return Ok(cropped);
        }
        Ok(imageops::resize(&cropped, size.0, size.1, FilterType::Triangle))
    }

    /// Full frame with each region outlined.
    pub fn highlighted(&self, regions: &[BoundingBox]) -> Result<RgbImage> {
        let mut image = self.to_image()?;
        for region in regions {
            if let Some(rect) = self.clamp_region(region) {
                outline(&mut image, rect);
            }
        }
        Ok(image)
    }

    fn clamp_region(&self, region: &BoundingBox) -> Option<(u32, u32, u32, u32)> {
        if region.is_degenerate() {
            return None;
        }
        let max_x = self.width as f32;
        let max_y = self.height as f32;
        let x1 = region.x1.clamp(0.0, max_x).floor() as u32;
        let y1 = region.y1.clamp(0.0, max_y).floor() as u32;
        let x2 = region.x2.clamp(0.0, max_x).ceil() as u32;
        let y2 = region.y2.clamp(0.0, max_y).ceil() as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

fn outline(image: &mut RgbImage, (x, y, w, h): (u32, u32, u32, u32)) {
    for dy in 0..h {
        for dx in 0..w {
            let edge = dx < HIGHLIGHT_THICKNESS
                || dy < HIGHLIGHT_THICKNESS
                || dx + HIGHLIGHT_THICKNESS >= w
                || dy + HIGHLIGHT_THICKNESS >= h;
            if edge {
                image.put_pixel(x + dx, y + dy, HIGHLIGHT_COLOR);
            }
        }
    }
}
