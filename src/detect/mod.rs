mod reconcile;
mod result;

pub use reconcile::{
    active, first_announced, reconcile, DetectionSummary, ObjectCounts, MAX_DETECTIONS,
};
pub use result::{Detection, DetectionStatus, Track, TrackRecord};
