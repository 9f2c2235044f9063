//! Person to equipment association.
//!
//! Each person box is checked against every detection of each required
//! equipment class. A person counts as wearing a class when at least one box
//! of that class overlaps it with IoU strictly above the threshold.
//!
//! Matching is existential, not a 1:1 assignment: one hardhat box may satisfy
//! two overlapping persons.

use anyhow::{anyhow, Result};

use crate::detect::ClassLabel;
use crate::geometry::BoundingBox;
use crate::ingest::FrameDetectionSet;

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.2;

/// Equipment classes every person must wear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredEquipment {
    classes: Vec<ClassLabel>,
}

impl RequiredEquipment {
    pub fn new(classes: impl IntoIterator<Item = ClassLabel>) -> Result<Self> {
        let mut out: Vec<ClassLabel> = Vec::new();
        for class in classes {
            if !class.is_equipment() {
                return Err(anyhow!("{} is not a protective equipment class", class));
            }
            if !out.contains(&class) {
                out.push(class);
            }
        }
        if out.is_empty() {
            return Err(anyhow!("at least one required equipment class is needed"));
        }
        Ok(Self { classes: out })
    }

    pub fn hardhat_only() -> Self {
        Self {
            classes: vec![ClassLabel::Hardhat],
        }
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }
}

impl Default for RequiredEquipment {
    fn default() -> Self {
        Self::hardhat_only()
    }
}

/// Per-person verdict for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AssociationResult {
    pub person: BoundingBox,
    pub equipped: Vec<(ClassLabel, bool)>,
}

impl AssociationResult {
    /// Whether the person wears `class`. Classes that were not required report `false`.
    pub fn has(&self, class: ClassLabel) -> bool {
        self.equipped
            .iter()
            .any(|(label, equipped)| *label == class && *equipped)
    }

    pub fn is_equipped(&self) -> bool {
        self.equipped.iter().all(|(_, equipped)| *equipped)
    }

    pub fn missing(&self) -> impl Iterator<Item = ClassLabel> + '_ {
        self.equipped
            .iter()
            .filter(|(_, equipped)| !*equipped)
            .map(|(label, _)| *label)
    }
}

#[derive(Clone, Debug)]
pub struct Associator {
    iou_threshold: f32,
    required: RequiredEquipment,
}

impl Associator {
    pub fn new(iou_threshold: f32, required: RequiredEquipment) -> Self {
        Self {
            iou_threshold,
            required,
        }
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn required(&self) -> &RequiredEquipment {
        &self.required
    }

    /// One result per person detection, in detection order.
    pub fn associate(&self, set: &FrameDetectionSet) -> Vec<AssociationResult> {
        set.boxes(ClassLabel::Person)
            .map(|person| {
                let equipped = self
                    .required
                    .classes()
                    .iter()
                    .map(|class| {
                        let covered = set
                            .boxes(*class)
                            .any(|item| person.iou(item) > self.iou_threshold);
                        (*class, covered)
                    })
                    .collect();
                AssociationResult {
                    person: *person,
                    equipped,
                }
            })
            .collect()
    }
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, RequiredEquipment::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionRecord;

    fn record(label: ClassLabel, bbox: BoundingBox) -> DetectionRecord {
        DetectionRecord {
            label,
            bbox,
            confidence: 0.9,
        }
    }

    #[test]
    fn person_with_overlapping_hardhat_is_equipped() {
        let mut set = FrameDetectionSet::new();
        set.push(record(ClassLabel::Person, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        set.push(record(ClassLabel::Hardhat, BoundingBox::new(0.0, 0.0, 10.0, 5.0)));

        let results = Associator::default().associate(&set);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_equipped());
        assert!(results[0].has(ClassLabel::Hardhat));
    }

    #[test]
    fn overlap_must_exceed_threshold() {
        let mut set = FrameDetectionSet::new();
        set.push(record(ClassLabel::Person, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        // IoU exactly 0.2: intersection 20, union 100.
        set.push(record(ClassLabel::Hardhat, BoundingBox::new(0.0, 0.0, 10.0, 2.0)));

        let results = Associator::default().associate(&set);
        assert!(!results[0].is_equipped());
        assert_eq!(results[0].missing().collect::<Vec<_>>(), vec![ClassLabel::Hardhat]);
    }

    #[test]
    fn no_candidates_leaves_everyone_unequipped() {
        let mut set = FrameDetectionSet::new();
        set.push(record(ClassLabel::Person, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        set.push(record(ClassLabel::Person, BoundingBox::new(20.0, 0.0, 30.0, 10.0)));

        let results = Associator::default().associate(&set);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_equipped()));
    }

    #[test]
    fn one_hardhat_may_cover_two_overlapping_persons() {
        let mut set = FrameDetectionSet::new();
        set.push(record(ClassLabel::Person, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        set.push(record(ClassLabel::Person, BoundingBox::new(1.0, 0.0, 11.0, 10.0)));
        set.push(record(ClassLabel::Hardhat, BoundingBox::new(0.5, 0.0, 10.5, 10.0)));

        let results = Associator::default().associate(&set);
        assert!(results.iter().all(AssociationResult::is_equipped));
    }

    #[test]
    fn every_required_class_must_be_covered() -> Result<()> {
        let required = RequiredEquipment::new([ClassLabel::Hardhat, ClassLabel::SafetyVest])?;
        let mut set = FrameDetectionSet::new();
        set.push(record(ClassLabel::Person, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        set.push(record(ClassLabel::Hardhat, BoundingBox::new(0.0, 0.0, 10.0, 6.0)));

        let results = Associator::new(DEFAULT_IOU_THRESHOLD, required).associate(&set);
        assert!(results[0].has(ClassLabel::Hardhat));
        assert!(!results[0].has(ClassLabel::SafetyVest));
        assert!(!results[0].is_equipped());
        Ok(())
    }

    #[test]
    fn required_equipment_rejects_non_equipment_classes() {
        assert!(RequiredEquipment::new([ClassLabel::Person]).is_err());
        assert!(RequiredEquipment::new([ClassLabel::Other]).is_err());
        assert!(RequiredEquipment::new(Vec::new()).is_err());
    }
}
