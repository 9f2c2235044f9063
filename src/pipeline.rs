//! Session driver.
//!
//! `Idle -> Running -> Finalizing -> Done`. One frame is fully processed
//! (detect, ingest, associate, evaluate, capture, aggregate) before the next
//! is pulled. All per-session state (throttle, snapshot schedule, counters)
//! lives in the `Pipeline` and is built fresh for each session; a pipeline
//! that reached `Done` cannot be run again.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::artifacts::{ArtifactRecord, ArtifactRequest, ArtifactStore};
use crate::associate::{Associator, RequiredEquipment, DEFAULT_IOU_THRESHOLD};
use crate::detect::{ClassLabel, DetectorBackend};
use crate::frame::Frame;
use crate::ingest::{ingest_detections, ConfidenceThresholds, FrameSource};
use crate::notify::Notifier;
use crate::policy::{Verdict, ViolationPolicy};
use crate::session::{SessionAggregator, SessionCounters, SessionSummary};
use crate::throttle::{AlertThrottler, SnapshotSchedule, DEFAULT_THROTTLE_INTERVAL};

pub const DEFAULT_HEALTH_LOG_FRAMES: u64 = 250;

/// Decision parameters for one session.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub policy: ViolationPolicy,
    pub thresholds: ConfidenceThresholds,
    pub iou_threshold: f32,
    pub required_equipment: RequiredEquipment,
    pub throttle_interval: Duration,
    pub snapshot_interval: u64,
    /// Log a source health line every N frames (0 disables).
    pub health_log_frames: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let policy = ViolationPolicy::default();
        Self {
            policy,
            thresholds: ConfidenceThresholds::default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            required_equipment: RequiredEquipment::default(),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            snapshot_interval: policy.default_snapshot_interval(),
            health_log_frames: DEFAULT_HEALTH_LOG_FRAMES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Finalizing,
    Done,
}

/// Per-frame dashboard metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub persons: usize,
    pub hardhats: usize,
    pub face_masks: usize,
    pub vests: usize,
    pub verdict: Verdict,
    /// Violation frames so far, including this one.
    pub violation_frames: u64,
    pub artifacts: Vec<ArtifactRecord>,
}

pub struct Pipeline<S, D, A, N> {
    settings: PipelineSettings,
    source: S,
    detector: D,
    store: A,
    notifier: N,
    state: SessionState,
    associator: Associator,
    throttler: AlertThrottler,
    snapshots: SnapshotSchedule,
    aggregator: SessionAggregator,
}

impl<S, D, A, N> Pipeline<S, D, A, N>
where
    S: FrameSource,
    D: DetectorBackend,
    A: ArtifactStore,
    N: Notifier,
{
    pub fn new(
        settings: PipelineSettings,
        source: S,
        detector: D,
        store: A,
        notifier: N,
    ) -> Result<Self> {
        let snapshots = SnapshotSchedule::new(settings.snapshot_interval)?;
        let associator = Associator::new(
            settings.iou_threshold,
            settings.required_equipment.clone(),
        );
        Ok(Self {
            throttler: AlertThrottler::new(settings.throttle_interval),
            aggregator: SessionAggregator::new(settings.policy),
            associator,
            snapshots,
            settings,
            source,
            detector,
            store,
            notifier,
            state: SessionState::Idle,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn counters(&self) -> &SessionCounters {
        self.aggregator.counters()
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run the session to completion.
    ///
    /// Fails without entering `Running` when the source, detector or artifact
    /// store cannot be opened. Once running, the session always finalizes:
    /// end of stream, a frame read error and `cancel` all route to
    /// `Finalizing`. `cancel` is checked once per frame.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<SessionSummary> {
        self.run_observed(cancel, |_| {})
    }

    /// Like `run`, handing each frame's dashboard metrics to `observer` once
    /// the frame has been fully processed.
    pub fn run_observed<F>(
        &mut self,
        cancel: &AtomicBool,
        mut observer: F,
    ) -> Result<SessionSummary>
    where
        F: FnMut(&FrameReport),
    {
        if self.state != SessionState::Idle {
            return Err(anyhow!(
                "session already started (state {:?}); build a new pipeline",
                self.state
            ));
        }
        self.start().context("session start failed")?;
        self.state = SessionState::Running;
        log::info!(
            "session running: source={} detector={} policy={} throttle={:?} snapshot_every={}",
            self.source.describe(),
            self.detector.name(),
            self.settings.policy,
            self.settings.throttle_interval,
            self.settings.snapshot_interval
        );

        loop {
            if cancel.load(Ordering::SeqCst) {
                log::info!("session cancelled; finalizing");
                break;
            }
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::error!("frame source failed, finalizing session: {:#}", e);
                    break;
                }
            };
            let report = self.process_frame(&frame);
            log::debug!(
                "frame {}: persons={} hardhats={} face_masks={} vests={} violations={}",
                report.frame_index,
                report.persons,
                report.hardhats,
                report.face_masks,
                report.vests,
                report.violation_frames
            );
            self.log_health(frame.index);
            observer(&report);
        }

        Ok(self.finalize())
    }

    fn start(&mut self) -> Result<()> {
        self.source.connect()?;
        self.detector.warm_up()?;
        self.store.prepare()?;
        Ok(())
    }

    /// Process one frame. Only called while `Running`.
    fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let raw = match self.detector.detect(frame) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "detector failed on frame {}, treating as empty: {:#}",
                    frame.index,
                    e
                );
                Vec::new()
            }
        };
        let set = ingest_detections(&raw, &self.settings.thresholds);
        let associations = if self.settings.policy.requires_association() {
            Some(self.associator.associate(&set))
        } else {
            None
        };
        let verdict = self.settings.policy.evaluate(&set, associations.as_deref());

        let mut artifacts = Vec::new();
        if verdict.violating {
            for request in self.capture_requests(frame, &verdict) {
                match self.store.persist(&request, frame) {
                    Ok(location) => {
                        log::info!("alert saved: {}", location);
                        let record = ArtifactRecord {
                            kind: request.kind,
                            frame_index: request.frame_index,
                            name: request.name,
                            location,
                        };
                        self.aggregator.record_artifact(record.clone());
                        artifacts.push(record);
                    }
                    Err(e) => {
                        log::warn!("failed to persist {}: {:#}", request.name, e);
                    }
                }
            }
        }

        self.aggregator.record_frame(&set, verdict.violating);

        FrameReport {
            frame_index: frame.index,
            persons: set.count(ClassLabel::Person),
            hardhats: set.count(ClassLabel::Hardhat),
            face_masks: set.count(ClassLabel::FaceMask),
            vests: set.count(ClassLabel::SafetyVest),
            verdict,
            violation_frames: self.aggregator.counters().violation_frames,
            artifacts,
        }
    }

    fn capture_requests(&mut self, frame: &Frame, verdict: &Verdict) -> Vec<ArtifactRequest> {
        let mut requests = Vec::new();
        if verdict.violators.is_empty() {
            if self.throttler.should_capture(frame.timestamp) {
                requests.push(ArtifactRequest::alert(frame.index));
            }
        } else {
            for (ordinal, violator) in verdict.violators.iter().enumerate() {
                if self.throttler.should_capture(frame.timestamp) {
                    requests.push(ArtifactRequest::violator(frame.index, ordinal + 1, *violator));
                } else {
                    log::debug!(
                        "frame {}: violator {} capture throttled",
                        frame.index,
                        ordinal + 1
                    );
                }
            }
        }
        if self.snapshots.is_due(frame.index) {
            requests.push(ArtifactRequest::summary(frame.index, &verdict.violators));
        }
        requests
    }

    fn finalize(&mut self) -> SessionSummary {
        self.state = SessionState::Finalizing;
        let aggregator = std::mem::replace(
            &mut self.aggregator,
            SessionAggregator::new(self.settings.policy),
        );
        let summary = aggregator.finalize();
        log::info!(
            "session finished: {} frames, {} violation frames, {} artifacts",
            summary.total_frames,
            summary.violation_frames,
            summary.artifacts.len()
        );
        if let Err(e) = self.notifier.notify(&summary) {
            log::error!("notifier failed: {:#}", e);
        }
        self.state = SessionState::Done;
        summary
    }

    fn log_health(&self, frame_index: u64) {
        let every = self.settings.health_log_frames;
        if every == 0 || frame_index % every != 0 {
            return;
        }
        let stats = self.source.stats();
        log::info!(
            "source health={} frames={} location={} violation_frames={}",
            self.source.is_healthy(),
            stats.frames_captured,
            stats.location,
            self.aggregator.counters().violation_frames
        );
    }
}
