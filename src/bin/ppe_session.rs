//! ppe_session - run one PPE violation session over recorded detections
//!
//! This binary:
//! 1. Loads the session configuration (file + env overrides)
//! 2. Replays recorded detector output against a frame source
//!    (extracted image frames, or synthetic frames when none are given)
//! 3. Captures throttled violator crops and periodic summaries
//! 4. Logs the session summary and optionally writes a JSON report

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ppe_witness::{
    BackendRegistry, FilesystemArtifactStore, FrameSource, ImageDirConfig, ImageDirSource,
    JsonReportNotifier, LogNotifier, NotifierChain, Pipeline, ReplayBackend, SessionConfig,
    StubBackend, SyntheticConfig, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Session config file (.json or .toml).
    #[arg(long, env = "PPE_CONFIG")]
    config: Option<PathBuf>,
    /// Recorded detector output (JSON Lines, one object per frame).
    #[arg(long)]
    detections: PathBuf,
    /// Detector backend to use (replay, stub).
    #[arg(long)]
    backend: Option<String>,
    /// Directory of extracted frames. Synthetic frames are used when omitted.
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Override the violation policy (presence | count-deficit | per-person).
    #[arg(long)]
    policy: Option<String>,
    /// Override the source frame rate.
    #[arg(long)]
    fps: Option<f64>,
    /// Synthetic frame width.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Synthetic frame height.
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Write the JSON report here (overrides the config file).
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = SessionConfig::load_from(args.config.as_deref())?;
    if let Some(policy) = &args.policy {
        config.set_policy(policy.parse()?);
    }
    if let Some(fps) = args.fps {
        if !(fps > 0.0) {
            return Err(anyhow!("fps must be greater than zero"));
        }
        config.fps = fps;
    }
    if let Some(report) = &args.report {
        config.report_path = Some(report.clone());
    }

    let replay = ReplayBackend::from_path(&args.detections)?;
    let recorded_frames = replay.frame_count();
    let mut registry = BackendRegistry::new();
    registry.register(replay);
    registry.register(StubBackend::default());
    let detector = registry.take(args.backend.as_deref())?;

    let source: Box<dyn FrameSource> = match &args.frames {
        Some(dir) => Box::new(ImageDirSource::new(ImageDirConfig {
            path: dir.clone(),
            fps: config.fps,
        })?),
        None => Box::new(SyntheticSource::new(SyntheticConfig {
            frames: recorded_frames,
            fps: config.fps,
            width: args.width,
            height: args.height,
            ..SyntheticConfig::default()
        })?),
    };

    let mut notifier = NotifierChain::new().with(LogNotifier);
    if let Some(path) = &config.report_path {
        notifier = notifier.with(JsonReportNotifier::new(path.clone()));
    }

    log::info!(
        "policy={} iou_threshold={} throttle={:?} snapshot_every={} artifacts={}",
        config.policy,
        config.iou_threshold,
        config.throttle_interval,
        config.snapshot_interval,
        config.artifacts.dir.display()
    );
    for (label, threshold) in config.thresholds.iter() {
        log::info!("confidence threshold {}={:.2}", label, threshold);
    }

    let mut pipeline = Pipeline::new(
        config.pipeline_settings()?,
        source,
        detector,
        FilesystemArtifactStore::new(config.store_config()),
        notifier,
    )?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let summary = pipeline.run(&cancel)?;
    log::info!("summary digest {}", summary.digest()?);
    Ok(())
}
