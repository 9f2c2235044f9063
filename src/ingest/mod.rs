//! Frame sources and detection ingestion.
//!
//! Sources produce decoded `Frame`s one at a time; the pipeline pulls the next
//! frame only after the previous one is fully processed. Sources provided:
//! - Synthetic `stub://` source (testing, replaying recorded detections)
//! - Directory of extracted image frames
//!
//! Ingestion turns one frame's raw detector output into a thresholded
//! `FrameDetectionSet`.

use anyhow::Result;

use crate::frame::Frame;

mod detections;
pub mod image_dir;
pub mod synthetic;

pub use detections::{
    ingest_detections, ConfidenceThresholds, FrameDetectionSet, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use image_dir::{ImageDirConfig, ImageDirSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A sequential source of frames for one session.
pub trait FrameSource {
    /// Human-readable source location for logs.
    fn describe(&self) -> String;

    /// Open the source. Failure here is a session start failure.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// Frame-time of a 1-based frame index at `fps`.
pub(crate) fn frame_time(index: u64, fps: f64) -> std::time::Duration {
    std::time::Duration::from_nanos((index as f64 * 1e9 / fps).round() as u64)
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
