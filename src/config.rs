use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifacts::{FilesystemStoreConfig, DEFAULT_ARTIFACT_DIR, DEFAULT_CROP_SIZE};
use crate::associate::{RequiredEquipment, DEFAULT_IOU_THRESHOLD};
use crate::detect::ClassLabel;
use crate::ingest::ConfidenceThresholds;
use crate::pipeline::{PipelineSettings, DEFAULT_HEALTH_LOG_FRAMES};
use crate::policy::ViolationPolicy;
use crate::throttle::DEFAULT_THROTTLE_INTERVAL;

const DEFAULT_FPS: f64 = 25.0;

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    policy: Option<String>,
    thresholds: Option<BTreeMap<String, f32>>,
    iou_threshold: Option<f32>,
    required_equipment: Option<Vec<String>>,
    throttle: Option<ThrottleConfigFile>,
    artifacts: Option<ArtifactConfigFile>,
    source: Option<SourceConfigFile>,
    report_path: Option<PathBuf>,
    health_log_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ThrottleConfigFile {
    min_interval_secs: Option<f64>,
    snapshot_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ArtifactConfigFile {
    dir: Option<PathBuf>,
    clear_on_start: Option<bool>,
    crop_width: Option<u32>,
    crop_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    fps: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub policy: ViolationPolicy,
    pub thresholds: ConfidenceThresholds,
    pub iou_threshold: f32,
    pub required_equipment: Vec<ClassLabel>,
    pub throttle_interval: Duration,
    /// Resolved after every override; follows the policy unless set explicitly.
    pub snapshot_interval: u64,
    configured_snapshot_interval: Option<u64>,
    pub artifacts: ArtifactSettings,
    /// Frame rate used when the source does not carry its own timing.
    pub fps: f64,
    pub report_path: Option<PathBuf>,
    pub health_log_frames: u64,
}

#[derive(Debug, Clone)]
pub struct ArtifactSettings {
    pub dir: PathBuf,
    pub clear_on_start: bool,
    pub crop_size: (u32, u32),
}

impl SessionConfig {
    /// Load from the file named by `PPE_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PPE_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SessionConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.resolve_snapshot_interval();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SessionConfigFile) -> Result<Self> {
        let policy = match file.policy.as_deref() {
            Some(policy) => policy.parse()?,
            None => ViolationPolicy::default(),
        };
        let mut thresholds = ConfidenceThresholds::default();
        if let Some(entries) = file.thresholds {
            for (label, value) in entries {
                thresholds.set(parse_known_label(&label)?, value);
            }
        }
        let required_equipment = match file.required_equipment {
            Some(labels) => labels
                .iter()
                .map(|label| parse_known_label(label))
                .collect::<Result<Vec<_>>>()?,
            None => vec![ClassLabel::Hardhat],
        };
        let throttle_interval = match file
            .throttle
            .as_ref()
            .and_then(|throttle| throttle.min_interval_secs)
        {
            Some(secs) => duration_from_secs(secs)?,
            None => DEFAULT_THROTTLE_INTERVAL,
        };
        let configured_snapshot_interval = file
            .throttle
            .as_ref()
            .and_then(|throttle| throttle.snapshot_interval);
        let artifacts = ArtifactSettings {
            dir: file
                .artifacts
                .as_ref()
                .and_then(|artifacts| artifacts.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
            clear_on_start: file
                .artifacts
                .as_ref()
                .and_then(|artifacts| artifacts.clear_on_start)
                .unwrap_or(true),
            crop_size: (
                file.artifacts
                    .as_ref()
                    .and_then(|artifacts| artifacts.crop_width)
                    .unwrap_or(DEFAULT_CROP_SIZE.0),
                file.artifacts
                    .as_ref()
                    .and_then(|artifacts| artifacts.crop_height)
                    .unwrap_or(DEFAULT_CROP_SIZE.1),
            ),
        };
        Ok(Self {
            policy,
            thresholds,
            iou_threshold: file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            required_equipment,
            throttle_interval,
            snapshot_interval: configured_snapshot_interval
                .unwrap_or_else(|| policy.default_snapshot_interval()),
            configured_snapshot_interval,
            artifacts,
            fps: file
                .source
                .and_then(|source| source.fps)
                .unwrap_or(DEFAULT_FPS),
            report_path: file.report_path,
            health_log_frames: file.health_log_frames.unwrap_or(DEFAULT_HEALTH_LOG_FRAMES),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(policy) = std::env::var("PPE_POLICY") {
            if !policy.trim().is_empty() {
                self.policy = policy.parse()?;
            }
        }
        if let Ok(dir) = std::env::var("PPE_ARTIFACT_DIR") {
            if !dir.trim().is_empty() {
                self.artifacts.dir = PathBuf::from(dir);
            }
        }
        if let Ok(secs) = std::env::var("PPE_THROTTLE_SECS") {
            let secs: f64 = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("PPE_THROTTLE_SECS must be a number of seconds"))?;
            self.throttle_interval = duration_from_secs(secs)?;
        }
        if let Ok(interval) = std::env::var("PPE_SNAPSHOT_INTERVAL") {
            let interval = interval
                .trim()
                .parse()
                .map_err(|_| anyhow!("PPE_SNAPSHOT_INTERVAL must be an integer frame count"))?;
            self.configured_snapshot_interval = Some(interval);
        }
        if let Ok(iou) = std::env::var("PPE_IOU_THRESHOLD") {
            self.iou_threshold = iou
                .trim()
                .parse()
                .map_err(|_| anyhow!("PPE_IOU_THRESHOLD must be a number"))?;
        }
        if let Ok(thresholds) = std::env::var("PPE_THRESHOLDS") {
            for entry in split_csv(&thresholds) {
                let (label, value) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("PPE_THRESHOLDS entries must be label=value"))?;
                let value: f32 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid threshold for {}", label.trim()))?;
                self.thresholds.set(parse_known_label(label)?, value);
            }
        }
        Ok(())
    }

    /// Switch policy after loading. An interval that was never configured
    /// follows the new policy's default.
    pub fn set_policy(&mut self, policy: ViolationPolicy) {
        self.policy = policy;
        self.resolve_snapshot_interval();
    }

    fn resolve_snapshot_interval(&mut self) {
        self.snapshot_interval = self
            .configured_snapshot_interval
            .unwrap_or_else(|| self.policy.default_snapshot_interval());
    }

    fn validate(&self) -> Result<()> {
        for (label, threshold) in self.thresholds.iter() {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(anyhow!(
                    "confidence threshold for {} must be within [0, 1]",
                    label
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(anyhow!("iou threshold must be within [0, 1]"));
        }
        if self.snapshot_interval == 0 {
            return Err(anyhow!("snapshot interval must be >= 1 frame"));
        }
        if !(self.fps > 0.0) {
            return Err(anyhow!("fps must be greater than zero"));
        }
        RequiredEquipment::new(self.required_equipment.iter().copied())?;
        Ok(())
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            policy: self.policy,
            thresholds: self.thresholds.clone(),
            iou_threshold: self.iou_threshold,
            required_equipment: RequiredEquipment::new(self.required_equipment.iter().copied())?,
            throttle_interval: self.throttle_interval,
            snapshot_interval: self.snapshot_interval,
            health_log_frames: self.health_log_frames,
        })
    }

    pub fn store_config(&self) -> FilesystemStoreConfig {
        FilesystemStoreConfig {
            root: self.artifacts.dir.clone(),
            crop_size: self.artifacts.crop_size,
            clear_on_start: self.artifacts.clear_on_start,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SessionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_known_label(name: &str) -> Result<ClassLabel> {
    match ClassLabel::parse(name) {
        ClassLabel::Other => Err(anyhow!("unknown class label '{}'", name.trim())),
        label => Ok(label),
    }
}

fn duration_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        anyhow!(
            "throttle interval must be a non-negative number of seconds ({}): {}",
            secs,
            e
        )
    })
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
