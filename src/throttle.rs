//! Artifact capture gates.
//!
//! `AlertThrottler` limits violator captures to one per `min_interval` of frame
//! time. `SnapshotSchedule` is an independent, stateless every-N-frames gate
//! for periodic highlighted summaries. Both may fire on the same frame.

use anyhow::{anyhow, Result};
use std::time::Duration;

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(8);

/// Minimum-interval gate. Session scoped; construct a fresh one per session.
#[derive(Clone, Debug)]
pub struct AlertThrottler {
    min_interval: Duration,
    last_capture: Option<Duration>,
}

impl AlertThrottler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_capture: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_capture(&self) -> Option<Duration> {
        self.last_capture
    }

    /// Decide and consume in one step: a `true` result records `now` as the
    /// last capture, whether or not the caller then persists anything.
    ///
    /// Timestamps earlier than the last capture (a clock step backwards) are
    /// refused until the interval has elapsed from the recorded capture.
    pub fn should_capture(&mut self, now: Duration) -> bool {
        let allowed = match self.last_capture {
            None => true,
            Some(last) => now
                .checked_sub(last)
                .is_some_and(|elapsed| elapsed >= self.min_interval),
        };
        if allowed {
            self.last_capture = Some(now);
        }
        allowed
    }

    pub fn reset(&mut self) {
        self.last_capture = None;
    }
}

impl Default for AlertThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}

/// Every-N-frames gate keyed on the 1-based frame index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotSchedule {
    interval: u64,
}

impl SnapshotSchedule {
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(anyhow!("snapshot interval must be >= 1 frame"));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_due(&self, frame_index: u64) -> bool {
        frame_index % self.interval == 0
    }
}
