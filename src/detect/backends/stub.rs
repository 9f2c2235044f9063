use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Stub backend for testing. Replays a fixed script of per-frame detections,
/// cycling when the script is shorter than the session.
pub struct StubBackend {
    script: Vec<Vec<RawDetection>>,
}

impl StubBackend {
    /// Same detections on every frame.
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            script: vec![detections],
        }
    }

    pub fn with_script(script: Vec<Vec<RawDetection>>) -> Self {
        Self { script }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let slot = (frame.index.saturating_sub(1) % self.script.len() as u64) as usize;
        Ok(self.script[slot].clone())
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
    fn stub_backend_cycles_script() -> Result<()> {
        let person = RawDetection::new("Person", [0.0, 0.0, 10.0, 10.0], 0.9);
        let mut backend = StubBackend::with_script(vec![vec![person.clone()], vec![]]);

        assert_eq!(backend.detect(&frame(1))?, vec![person.clone()]);
        assert!(backend.detect(&frame(2))?.is_empty());
        assert_eq!(backend.detect(&frame(3))?, vec![person]);
        Ok(())
    }

    #[test]
    fn empty_stub_yields_no_detections() -> Result<()> {
        let mut backend = StubBackend::default();
        assert!(backend.detect(&frame(1))?.is_empty());
        Ok(())
    }
}
