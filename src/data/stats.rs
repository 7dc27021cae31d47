use serde::Serialize;

use super::model::{DatasetIndex, CANONICAL_ORDER, NUM_CLASSES};

/// Positive count for one canonical output slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPrevalence {
    pub slot: usize,
    pub name: &'static str,
    pub positives: usize,
    pub ratio: f64,
}

/// Count positives per canonical slot over every row of `index`.
///
/// Slots 0 and 8 both read the Atelectasis column, so they always agree.
pub fn class_prevalence(index: &DatasetIndex) -> Vec<ClassPrevalence> {
    let mut counts = [0usize; NUM_CLASSES];
    for position in 0..index.len() {
        if let Some(labels) = index.canonical_labels(position) {
            for (count, label) in counts.iter_mut().zip(labels) {
                if label > 0 {
                    *count += 1;
                }
            }
        }
    }

    let total = index.len();
    CANONICAL_ORDER
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(slot, (class, positives))| ClassPrevalence {
            slot,
            name: class.name(),
            positives,
            ratio: if total == 0 {
                0.0
            } else {
                positives as f64 / total as f64
            },
        })
        .collect()
}
