//! Artifact persistence.
//!
//! The pipeline decides whether a capture happens and how it is named; an
//! `ArtifactStore` performs the write. Store failures are reported to the
//! caller and never abort a session.
//!
//! Artifact streams:
//! - `violation_{frame:05}_{n}`: throttled crop of an unequipped person
//! - `alert_{frame:05}`: throttled full frame when the policy names no violator
//! - `summary_{frame:05}`: periodic full frame with violators outlined

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::geometry::BoundingBox;

pub const DEFAULT_ARTIFACT_DIR: &str = "violator_images";
pub const DEFAULT_CROP_SIZE: (u32, u32) = (150, 200);
const JPEG_QUALITY: u8 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    ViolatorCrop,
    Alert,
    Summary,
}

/// A capture the pipeline wants persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactRequest {
    pub kind: ArtifactKind,
    pub frame_index: u64,
    pub name: String,
    /// Crop region for `ViolatorCrop`, outlined regions for `Summary`.
    pub regions: Vec<BoundingBox>,
}

impl ArtifactRequest {
    pub fn violator(frame_index: u64, ordinal: usize, region: BoundingBox) -> Self {
        Self {
            kind: ArtifactKind::ViolatorCrop,
            frame_index,
            name: format!("violation_{:05}_{}", frame_index, ordinal),
            regions: vec![region],
        }
    }

    pub fn alert(frame_index: u64) -> Self {
        Self {
            kind: ArtifactKind::Alert,
            frame_index,
            name: format!("alert_{:05}", frame_index),
            regions: Vec::new(),
        }
    }

    pub fn summary(frame_index: u64, violators: &[BoundingBox]) -> Self {
        Self {
            kind: ArtifactKind::Summary,
            frame_index,
            name: format!("summary_{:05}", frame_index),
            regions: violators.to_vec(),
        }
    }
}

/// A persisted artifact, listed in the session summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub frame_index: u64,
    pub name: String,
    pub location: String,
}

/// Persistence collaborator.
pub trait ArtifactStore {
    /// Reset per-session state. Called once before the session starts;
    /// failure is a session start failure.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Persist one artifact, returning where it was written.
    fn persist(&mut self, request: &ArtifactRequest, frame: &Frame) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct FilesystemStoreConfig {
    pub root: PathBuf,
    pub crop_size: (u32, u32),
    /// Remove artifacts left by a previous session in `prepare`.
    pub clear_on_start: bool,
}

impl Default for FilesystemStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            crop_size: DEFAULT_CROP_SIZE,
            clear_on_start: true,
        }
    }
}

/// Writes artifacts as JPEG files under a local directory.
pub struct FilesystemArtifactStore {
    config: FilesystemStoreConfig,
}

impl FilesystemArtifactStore {
    pub fn new(config: FilesystemStoreConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn render(&self, request: &ArtifactRequest, frame: &Frame) -> Result<RgbImage> {
        match request.kind {
            ArtifactKind::ViolatorCrop => {
                let region = request
                    .regions
                    .first()
                    .ok_or_else(|| anyhow!("violator artifact {} has no region", request.name))?;
                frame.crop(region, self.config.crop_size)
            }
            ArtifactKind::Alert => frame.to_image(),
            ArtifactKind::Summary => frame.highlighted(&request.regions),
        }
    }
}

impl ArtifactStore for FilesystemArtifactStore {
    fn prepare(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.root).with_context(|| {
            format!(
                "cannot create artifact directory {}",
                self.config.root.display()
            )
        })?;
        if self.config.clear_on_start {
            let mut removed = 0usize;
            for entry in fs::read_dir(&self.config.root)? {
                let path = entry?.path();
                let is_jpeg = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
                if path.is_file() && is_jpeg {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
            if removed > 0 {
                log::info!(
                    "cleared {} artifacts from {}",
                    removed,
                    self.config.root.display()
                );
            }
        }
        Ok(())
    }

    fn persist(&mut self, request: &ArtifactRequest, frame: &Frame) -> Result<String> {
        let name = sanitize_artifact_name(&request.name)?;
        let path = self.config.root.join(format!("{}.jpg", name));
        let image = self.render(request, frame)?;

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&image)?;
        write_atomic(&path, &encoded)?;
        Ok(path.display().to_string())
    }
}

/// Keeps requests in memory without rendering. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    requests: Vec<ArtifactRequest>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[ArtifactRequest] {
        &self.requests
    }

    pub fn names(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.name.as_str()).collect()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn prepare(&mut self) -> Result<()> {
        self.requests.clear();
        Ok(())
    }

    fn persist(&mut self, request: &ArtifactRequest, _frame: &Frame) -> Result<String> {
        self.requests.push(request.clone());
        Ok(format!("memory://{}", request.name))
    }
}

fn sanitize_artifact_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("artifact name cannot be empty"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(anyhow!("artifact name must be lowercase [a-z0-9_-] only"));
    }
    Ok(trimmed.to_string())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
