//! Session aggregation.
//!
//! Running counters are updated once per frame. At session end they are
//! finalized into an immutable `SessionSummary`.
//!
//! Per-class totals are sums of per-frame counts with no identity tracking, so
//! the same worker seen in 200 frames counts 200 times. Equipment totals are
//! therefore clamped to the person total before deficits are derived. The
//! clamp is a coarse heuristic correction, not an identity-aware recount.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::artifacts::ArtifactRecord;
use crate::detect::ClassLabel;
use crate::ingest::FrameDetectionSet;
use crate::policy::ViolationPolicy;

/// Equipment classes reported in every summary.
pub const SUMMARY_EQUIPMENT: [ClassLabel; 3] = [
    ClassLabel::Hardhat,
    ClassLabel::FaceMask,
    ClassLabel::SafetyVest,
];

/// Running totals for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub frames_processed: u64,
    pub violation_frames: u64,
    pub class_totals: BTreeMap<ClassLabel, u64>,
}

impl SessionCounters {
    pub fn total(&self, label: ClassLabel) -> u64 {
        self.class_totals.get(&label).copied().unwrap_or(0)
    }
}

/// Owns the counters and the list of captured artifacts for one session.
#[derive(Debug)]
pub struct SessionAggregator {
    policy: ViolationPolicy,
    counters: SessionCounters,
    artifacts: Vec<ArtifactRecord>,
}

impl SessionAggregator {
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            policy,
            counters: SessionCounters::default(),
            artifacts: Vec::new(),
        }
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Fold one processed frame into the running totals.
    pub fn record_frame(&mut self, set: &FrameDetectionSet, violating: bool) {
        self.counters.frames_processed += 1;
        for (label, count) in set.counts() {
            *self.counters.class_totals.entry(label).or_insert(0) += count as u64;
        }
        if violating {
            self.counters.violation_frames += 1;
        }
    }

    pub fn record_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Consume the aggregator and produce the session summary.
    pub fn finalize(self) -> SessionSummary {
        let persons = self.counters.total(ClassLabel::Person);
        let equipment: Vec<EquipmentTotal> = SUMMARY_EQUIPMENT
            .iter()
            .map(|class| {
                let detected = self.counters.total(*class);
                EquipmentTotal {
                    class: *class,
                    detected,
                    counted: detected.min(persons),
                }
            })
            .collect();
        let deficits = equipment
            .iter()
            .filter(|total| persons > total.counted)
            .map(|total| Deficit {
                class: total.class,
                persons,
                available: total.counted,
            })
            .collect();
        let class_totals = self
            .counters
            .class_totals
            .iter()
            .map(|(label, count)| (label.name().to_string(), *count))
            .collect();

        SessionSummary {
            policy: self.policy,
            total_frames: self.counters.frames_processed,
            violation_frames: self.counters.violation_frames,
            persons,
            equipment,
            other_detections: self.counters.total(ClassLabel::Other),
            class_totals,
            deficits,
            artifacts: self.artifacts,
        }
    }
}

/// Cumulative equipment count before and after clamping to the person total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EquipmentTotal {
    pub class: ClassLabel,
    pub detected: u64,
    pub counted: u64,
}

/// More persons than (clamped) items of an equipment class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Deficit {
    pub class: ClassLabel,
    pub persons: u64,
    pub available: u64,
}

impl Deficit {
    pub fn describe(&self) -> String {
        format!(
            "{} persons, only {} {}",
            self.persons,
            self.available,
            self.class.plural()
        )
    }
}

/// Immutable end-of-session snapshot handed to the notifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub policy: ViolationPolicy,
    pub total_frames: u64,
    pub violation_frames: u64,
    pub persons: u64,
    pub equipment: Vec<EquipmentTotal>,
    pub other_detections: u64,
    /// Unclamped cumulative totals for every class seen, keyed by display name.
    pub class_totals: BTreeMap<String, u64>,
    pub deficits: Vec<Deficit>,
    pub artifacts: Vec<ArtifactRecord>,
}

impl SessionSummary {
    pub fn has_violations(&self) -> bool {
        self.violation_frames > 0
    }

    /// Clamped total for an equipment class.
    pub fn counted(&self, class: ClassLabel) -> Option<u64> {
        self.equipment
            .iter()
            .find(|total| total.class == class)
            .map(|total| total.counted)
    }

    /// Plain-text report body.
    pub fn report_text(&self) -> String {
        let mut out = String::new();
        if self.has_violations() {
            let _ = writeln!(
                out,
                "Safety violations detected in {} out of {} frames ({} policy).",
                self.violation_frames, self.total_frames, self.policy
            );
        } else {
            let _ = writeln!(
                out,
                "All {} frames processed. No violations detected.",
                self.total_frames
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Summary Report:");
        let _ = writeln!(out, "Persons: {}", self.persons);
        for total in &self.equipment {
            let _ = writeln!(out, "{}: {}", report_heading(total.class), total.counted);
        }
        let _ = writeln!(out, "Violation Frames: {}", self.violation_frames);
        if !self.deficits.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Additional PPE Violations Detected:");
            for deficit in &self.deficits {
                let _ = writeln!(out, "- {}", deficit.describe());
            }
        }
        if !self.artifacts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Captured artifacts: {}", self.artifacts.len());
        }
        out
    }

    /// Hex SHA-256 over the canonical JSON form. Equal summaries have equal digests.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}

/// Row heading for an equipment total in the report body.
fn report_heading(class: ClassLabel) -> &'static str {
    match class {
        ClassLabel::Hardhat => "Hardhats",
        ClassLabel::FaceMask => "Face Masks",
        ClassLabel::SafetyVest => "Vests",
        other => other.plural(),
    }
}
