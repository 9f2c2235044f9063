//! Frame-level violation policies.
//!
//! Three interchangeable variants, selected once per session:
//!
//! - `Presence`: a person is visible and no hardhat is visible anywhere.
//! - `CountDeficit`: fewer hardhats than persons.
//! - `PerPerson`: at least one person is not covered by every required
//!   equipment class. The only variant that names individual violators.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::associate::AssociationResult;
use crate::detect::ClassLabel;
use crate::geometry::BoundingBox;
use crate::ingest::FrameDetectionSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationPolicy {
    Presence,
    CountDeficit,
    #[default]
    PerPerson,
}

/// Outcome of evaluating one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Verdict {
    pub violating: bool,
    /// Person boxes failing the policy. Always empty for frame-level policies.
    pub violators: Vec<BoundingBox>,
}

impl Verdict {
    fn frame_level(violating: bool) -> Self {
        Self {
            violating,
            violators: Vec::new(),
        }
    }
}

impl ViolationPolicy {
    /// Whether `evaluate` needs association results to decide.
    pub fn requires_association(self) -> bool {
        matches!(self, Self::PerPerson)
    }

    /// Periodic snapshot interval the policy runs with when none is configured.
    pub fn default_snapshot_interval(self) -> u64 {
        match self {
            Self::Presence | Self::CountDeficit => 80,
            Self::PerPerson => 70,
        }
    }

    /// Decide whether the frame is violating.
    ///
    /// `associations` is only consulted by `PerPerson`; passing `None` there
    /// means no person was associated and the frame is not violating.
    pub fn evaluate(
        self,
        set: &FrameDetectionSet,
        associations: Option<&[AssociationResult]>,
    ) -> Verdict {
        let persons = set.count(ClassLabel::Person);
        let hardhats = set.count(ClassLabel::Hardhat);
        match self {
            Self::Presence => Verdict::frame_level(persons > 0 && hardhats == 0),
            Self::CountDeficit => Verdict::frame_level(persons > 0 && hardhats < persons),
            Self::PerPerson => {
                let violators: Vec<BoundingBox> = associations
                    .unwrap_or_default()
                    .iter()
                    .filter(|result| !result.is_equipped())
                    .map(|result| result.person)
                    .collect();
                Verdict {
                    violating: !violators.is_empty(),
                    violators,
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Presence => "presence",
            Self::CountDeficit => "count-deficit",
            Self::PerPerson => "per-person",
        }
    }
}

impl fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "presence" => Ok(Self::Presence),
            "count-deficit" | "count" => Ok(Self::CountDeficit),
            "per-person" | "association" => Ok(Self::PerPerson),
            other => Err(anyhow!(
                "unknown violation policy '{}' (expected presence | count-deficit | per-person)",
                other
            )),
        }
    }
}
