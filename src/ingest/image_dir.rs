//! Frame source over a directory of extracted frames.
//!
//! Frames are read in lexicographic file-name order (`frame_00001.jpg`,
//! `frame_00002.jpg`, ...), decoded to RGB24, and timestamped with frame time
//! `index / fps`. Only `.jpg`, `.jpeg` and `.png` files are considered.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::{frame_time, FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct ImageDirConfig {
    pub path: PathBuf,
    pub fps: f64,
}

pub struct ImageDirSource {
    config: ImageDirConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    healthy: bool,
}

impl ImageDirSource {
    pub fn new(config: ImageDirConfig) -> Result<Self> {
        if !(config.fps > 0.0) {
            return Err(anyhow!("image directory source fps must be > 0"));
        }
        Ok(Self {
            config,
            files: Vec::new(),
            cursor: 0,
            healthy: false,
        })
    }
}

fn is_frame_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn describe(&self) -> String {
        self.config.path.display().to_string()
    }

    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.config.path).with_context(|| {
            format!("cannot open frame directory {}", self.config.path.display())
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!(
                "frame directory {} contains no image frames",
                self.config.path.display()
            ));
        }
        files.sort();
        log::info!(
            "ImageDirSource: {} frames in {}",
            files.len(),
            self.config.path.display()
        );
        self.files = files;
        self.cursor = 0;
        self.healthy = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let index = self.cursor as u64;
        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                self.healthy = false;
                return Err(anyhow!("failed to decode {}: {}", path.display(), e));
            }
        };
        Ok(Some(Frame::from_image(
            index,
            frame_time(index, self.config.fps),
            image,
        )))
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.cursor as u64,
            location: self.describe(),
        }
    }
}
