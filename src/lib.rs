//! PPE Witness
//!
//! This crate decides, frame by frame, whether workers seen by a PPE object
//! detector are missing required safety equipment, rate-limits the evidence it
//! captures, and reports a session summary at the end of a video.
//!
//! # Architecture
//!
//! Data flows strictly downstream, one frame at a time:
//!
//! 1. **Detection**: a `DetectorBackend` turns a `Frame` into raw
//!    `{label, box, confidence}` entries (external black box).
//! 2. **Ingestion**: raw entries below their class threshold are dropped and
//!    the rest grouped into a `FrameDetectionSet`.
//! 3. **Association**: person boxes are matched to equipment boxes by IoU.
//! 4. **Policy**: a `ViolationPolicy` (presence, count-deficit, per-person)
//!    yields a frame verdict and, for per-person, the violating boxes.
//! 5. **Capture**: an `AlertThrottler` and a periodic `SnapshotSchedule`
//!    decide which artifacts an `ArtifactStore` should persist.
//! 6. **Aggregation**: counters accumulate into a `SessionSummary` that is
//!    handed to a `Notifier`.
//!
//! # Module Structure
//!
//! - `geometry`: bounding boxes and IoU
//! - `detect`: class labels, detection records, detector backends
//! - `frame`: decoded RGB frames, crops and highlights
//! - `ingest`: frame sources and detection ingestion
//! - `associate`, `policy`, `throttle`, `session`: decision logic
//! - `artifacts`, `notify`: persistence and notifier collaborators
//! - `pipeline`: the session state machine
//! - `config`: session configuration loading

pub mod artifacts;
pub mod associate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod policy;
pub mod session;
pub mod throttle;

pub use artifacts::{
    ArtifactKind, ArtifactRecord, ArtifactRequest, ArtifactStore, FilesystemArtifactStore,
    FilesystemStoreConfig, InMemoryArtifactStore,
};
pub use associate::{AssociationResult, Associator, RequiredEquipment, DEFAULT_IOU_THRESHOLD};
pub use config::SessionConfig;
pub use detect::{
    BackendRegistry, ClassLabel, DetectionRecord, DetectorBackend, RawDetection, ReplayBackend,
    StubBackend,
};
pub use frame::Frame;
pub use geometry::{iou, BoundingBox};
pub use ingest::{
    ingest_detections, ConfidenceThresholds, FrameDetectionSet, FrameSource, ImageDirConfig,
    ImageDirSource, SourceStats, SyntheticConfig, SyntheticSource,
};
pub use notify::{InMemoryNotifier, JsonReportNotifier, LogNotifier, Notifier, NotifierChain};
pub use pipeline::{FrameReport, Pipeline, PipelineSettings, SessionState};
pub use policy::{Verdict, ViolationPolicy};
pub use session::{Deficit, EquipmentTotal, SessionAggregator, SessionCounters, SessionSummary};
pub use throttle::{AlertThrottler, SnapshotSchedule};
