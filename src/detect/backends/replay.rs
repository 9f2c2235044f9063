//! Recorded detector output.
//!
//! A recording is JSON Lines, one object per frame:
//!
//! ```text
//! {"frame": 1, "detections": [{"label": "Person", "box": [10, 20, 60, 140], "confidence": 0.91}]}
//! ```
//!
//! Frames missing from the recording replay as empty detections.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

#[derive(Debug, Deserialize, Serialize)]
struct RecordedFrame {
    frame: u64,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

/// Replays recorded detector output keyed by frame index.
pub struct ReplayBackend {
    frames: BTreeMap<u64, Vec<RawDetection>>,
}

impl ReplayBackend {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open detection recording {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("invalid detection recording {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut frames = BTreeMap::new();
        for (line_no, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let recorded: RecordedFrame = serde_json::from_str(&line)
                .map_err(|e| anyhow!("line {}: {}", line_no + 1, e))?;
            if recorded.frame == 0 {
                return Err(anyhow!("line {}: frame indices start at 1", line_no + 1));
            }
            if frames.insert(recorded.frame, recorded.detections).is_some() {
                return Err(anyhow!(
                    "line {}: duplicate entry for frame {}",
                    line_no + 1,
                    recorded.frame
                ));
            }
        }
        Ok(Self { frames })
    }

    /// Highest recorded frame index; the session length when replaying.
    pub fn frame_count(&self) -> u64 {
        self.frames.keys().next_back().copied().unwrap_or(0)
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(anyhow!("detection recording contains no frames"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(index: u64) -> Frame {
        Frame::new(index, Duration::ZERO, 1, 1, vec![0, 0, 0]).expect("frame")
    }

    #[test]
    fn replays_recorded_frames_and_gaps() -> Result<()> {
        let recording = r#"
{"frame": 1, "detections": [{"label": "Person", "box": [0, 0, 10, 20], "confidence": 0.8}]}

{"frame": 3}
"#;
        let mut backend = ReplayBackend::from_reader(recording.as_bytes())?;
        backend.warm_up()?;
        assert_eq!(backend.frame_count(), 3);
        assert_eq!(backend.detect(&frame(1))?.len(), 1);
        assert!(backend.detect(&frame(2))?.is_empty());
        assert!(backend.detect(&frame(3))?.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(ReplayBackend::from_reader("{\"frame\": \"x\"}".as_bytes()).is_err());
        assert!(ReplayBackend::from_reader("{\"frame\": 0}".as_bytes()).is_err());
        assert!(ReplayBackend::from_reader("{\"frame\": 2}\n{\"frame\": 2}".as_bytes()).is_err());
    }

    #[test]
    fn empty_recording_fails_warm_up() -> Result<()> {
        let mut backend = ReplayBackend::from_reader("".as_bytes())?;
        assert!(backend.warm_up().is_err());
        Ok(())
    }
}
