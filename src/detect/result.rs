use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::BoundingBox;

/// Class labels emitted by the PPE detector.
///
/// Labels the pipeline does not recognize map to `Other`. They are counted but
/// never take part in association or policy evaluation.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    Person,
    Hardhat,
    SafetyVest,
    FaceMask,
    NoHardhat,
    NoMask,
    NoSafetyVest,
    SafetyCone,
    Machinery,
    Vehicle,
    Other,
}

impl ClassLabel {
    /// Parse a detector display name. Case, spaces, dashes and underscores are ignored.
    pub fn parse(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "person" => Self::Person,
            "hardhat" | "helmet" => Self::Hardhat,
            "safetyvest" | "vest" => Self::SafetyVest,
            "facemask" | "mask" => Self::FaceMask,
            "nohardhat" => Self::NoHardhat,
            "nomask" => Self::NoMask,
            "nosafetyvest" => Self::NoSafetyVest,
            "safetycone" => Self::SafetyCone,
            "machinery" => Self::Machinery,
            "vehicle" => Self::Vehicle,
            _ => Self::Other,
        }
    }

    /// Display name as used in reports and config files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Hardhat => "Hardhat",
            Self::SafetyVest => "Safety Vest",
            Self::FaceMask => "Face Mask",
            Self::NoHardhat => "NO-Hardhat",
            Self::NoMask => "NO-Mask",
            Self::NoSafetyVest => "NO-Safety Vest",
            Self::SafetyCone => "Safety Cone",
            Self::Machinery => "machinery",
            Self::Vehicle => "vehicle",
            Self::Other => "other",
        }
    }

    /// Plural noun used in deficit findings ("only 2 hardhats").
    pub fn plural(self) -> &'static str {
        match self {
            Self::Person => "persons",
            Self::Hardhat => "hardhats",
            Self::SafetyVest => "vests",
            Self::FaceMask => "face masks",
            Self::NoHardhat => "no-hardhat detections",
            Self::NoMask => "no-mask detections",
            Self::NoSafetyVest => "no-vest detections",
            Self::SafetyCone => "safety cones",
            Self::Machinery => "machinery detections",
            Self::Vehicle => "vehicles",
            Self::Other => "other detections",
        }
    }

    /// Protective equipment worn by a person.
    pub fn is_equipment(self) -> bool {
        matches!(self, Self::Hardhat | Self::SafetyVest | Self::FaceMask)
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of raw detector output, before thresholding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(label: &str, bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            bbox,
            confidence,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let [x1, y1, x2, y2] = self.bbox;
        BoundingBox::new(x1, y1, x2, y2)
    }
}

/// A thresholded detection, scoped to the frame that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionRecord {
    pub label: ClassLabel,
    pub bbox: BoundingBox,
    pub confidence: f32,
}
