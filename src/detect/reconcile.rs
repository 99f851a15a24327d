//! Merging of `tracks` batches into the bounded detection list.
//!
//! The merge keys on `Detection::id`, the per-observation identifier, and not
//! on `persistent_id`. An object whose backend id changes between observations
//! shows up as several entries.

use std::collections::HashMap;

use super::result::{Detection, DetectionStatus};

/// Maximum detections retained after a merge.
pub const MAX_DETECTIONS: usize = 10;

/// Merge a freshly stamped batch into the previously held list.
///
/// New records come before old ones. The first record seen for an id claims
/// its position; a later record with the same id only replaces it when the
/// held timestamp is strictly older, and the replacement keeps the position.
pub fn reconcile(batch: &[Detection], previous: &[Detection]) -> Vec<Detection> {
    let mut merged: Vec<Detection> = Vec::with_capacity(batch.len() + previous.len());
    let mut index: HashMap<u64, usize> = HashMap::new();

    for candidate in batch.iter().chain(previous.iter()) {
        match index.get(&candidate.id) {
            None => {
                index.insert(candidate.id, merged.len());
                merged.push(candidate.clone());
            }
            Some(&slot) => {
                if merged[slot].timestamp < candidate.timestamp {
                    merged[slot] = candidate.clone();
                }
            }
        }
    }

    merged.truncate(MAX_DETECTIONS);
    merged
}

/// First record in the batch flagged for announcement.
pub fn first_announced(batch: &[Detection]) -> Option<&Detection> {
    batch.iter().find(|d| d.should_announce)
}

/// Live projection: everything but `lost`. Never mutates the input.
pub fn active(detections: &[Detection]) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.status.is_live())
        .cloned()
        .collect()
}

/// Per-class counts over the live set, matched by label substring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub people: usize,
    pub vehicles: usize,
    pub boats: usize,
}

/// Aggregates shown next to the live detection list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    pub active: usize,
    pub locked: usize,
    pub total_detections: u64,
    /// Mean `avg_confidence` over the live set, as a rounded percentage.
    pub confidence_pct: u32,
    pub objects: ObjectCounts,
}

impl DetectionSummary {
    pub fn compute(live: &[Detection], total_detections: u64) -> Self {
        let mut objects = ObjectCounts::default();
        for det in live {
            let label = det.label.to_lowercase();
            if label.contains("person") {
                objects.people += 1;
            } else if label.contains("car") || label.contains("vehicle") {
                objects.vehicles += 1;
            } else if label.contains("boat") || label.contains("ship") {
                objects.boats += 1;
            }
        }

        let confidence_sum: f64 = live.iter().map(|d| d.avg_confidence * 100.0).sum();
        let confidence_pct = (confidence_sum / live.len().max(1) as f64).round().max(0.0) as u32;

        Self {
            active: live.len(),
            locked: live
                .iter()
                .filter(|d| d.status == DetectionStatus::Locked)
                .count(),
            total_detections,
            confidence_pct,
            objects,
        }
    }
}
