//! Detection ingestion: raw detector output to a thresholded per-frame set.

use std::collections::BTreeMap;

use crate::detect::{ClassLabel, DetectionRecord, RawDetection};
use crate::geometry::BoundingBox;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Minimum confidence per class. Classes without an entry pass unfiltered.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceThresholds {
    thresholds: BTreeMap<ClassLabel, f32>,
}

impl ConfidenceThresholds {
    pub fn new(thresholds: BTreeMap<ClassLabel, f32>) -> Self {
        Self { thresholds }
    }

    /// No thresholds at all; every well-formed record passes.
    pub fn permissive() -> Self {
        Self {
            thresholds: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, label: ClassLabel, threshold: f32) {
        self.thresholds.insert(label, threshold);
    }

    pub fn get(&self, label: ClassLabel) -> Option<f32> {
        self.thresholds.get(&label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, f32)> + '_ {
        self.thresholds.iter().map(|(label, t)| (*label, *t))
    }

    pub fn admits(&self, label: ClassLabel, confidence: f32) -> bool {
        match self.get(label) {
            Some(threshold) => confidence >= threshold,
            None => true,
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        let thresholds = [
            ClassLabel::Person,
            ClassLabel::Hardhat,
            ClassLabel::FaceMask,
            ClassLabel::SafetyVest,
        ]
        .into_iter()
        .map(|label| (label, DEFAULT_CONFIDENCE_THRESHOLD))
        .collect();
        Self { thresholds }
    }
}

/// Detections of one frame grouped by class, in detector emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDetectionSet {
    by_label: BTreeMap<ClassLabel, Vec<DetectionRecord>>,
}

impl FrameDetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DetectionRecord) {
        self.by_label.entry(record.label).or_default().push(record);
    }

    pub fn records(&self, label: ClassLabel) -> &[DetectionRecord] {
        self.by_label
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn boxes(&self, label: ClassLabel) -> impl Iterator<Item = &BoundingBox> + '_ {
        self.records(label).iter().map(|record| &record.bbox)
    }

    pub fn count(&self, label: ClassLabel) -> usize {
        self.records(label).len()
    }

    /// Per-class record counts, including the `Other` bucket.
    pub fn counts(&self) -> impl Iterator<Item = (ClassLabel, usize)> + '_ {
        self.by_label
            .iter()
            .map(|(label, records)| (*label, records.len()))
    }

    pub fn len(&self) -> usize {
        self.by_label.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize one frame of raw detector output.
///
/// Records below their class threshold are dropped here and never reach the
/// associator or the policies. Records with a confidence outside `[0, 1]`
/// (including NaN) are malformed and dropped as well. An empty input yields
/// an empty set.
pub fn ingest_detections(
    raw: &[RawDetection],
    thresholds: &ConfidenceThresholds,
) -> FrameDetectionSet {
    let mut set = FrameDetectionSet::new();
    for detection in raw {
        let label = ClassLabel::parse(&detection.label);
        if label == ClassLabel::Other {
            log::debug!("unrecognized detector label '{}'", detection.label);
        }
        if !(0.0..=1.0).contains(&detection.confidence) {
            log::warn!(
                "dropping {} detection with invalid confidence {}",
                label,
                detection.confidence
            );
            continue;
        }
        if !thresholds.admits(label, detection.confidence) {
            continue;
        }
        set.push(DetectionRecord {
            label,
            bbox: detection.bounding_box(),
            confidence: detection.confidence,
        });
    }
    set
}
