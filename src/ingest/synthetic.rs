//! Synthetic frame source (`stub://`).
//!
//! Generates a fixed number of frames with deterministic pixels. Paired with
//! the replay detector it re-runs a recorded session without the original
//! video.

use anyhow::{anyhow, Result};

use super::{frame_time, FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Source URL, must start with `stub://`.
    pub url: String,
    /// Number of frames before end of stream.
    pub frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://site_camera".to_string(),
            frames: 0,
            fps: 25.0,
            width: 640,
            height: 480,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    scene_state: u8,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!("synthetic source requires a stub:// url"));
        }
        if !(config.fps > 0.0) {
            return Err(anyhow!("synthetic source fps must be > 0"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
            connected: false,
        })
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({} frames @ {} fps)",
            self.config.url,
            self.config.frames,
            self.config.fps
        );
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source not connected"));
        }
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::new(
            self.frame_count,
            frame_time(self.frame_count, self.config.fps),
            self.config.width,
            self.config.height,
            pixels,
        )?;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.config.url.clone(),
        }
    }
}
