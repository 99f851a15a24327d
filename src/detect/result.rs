use serde::{Deserialize, Serialize};

/// Backend-computed tracking status. Drives presentation urgency only; no
/// transitions are owned client-side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    #[default]
    Active,
    Locked,
    Lost,
    Suspicious,
}

impl DetectionStatus {
    /// Everything except `Lost` counts as live.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Lost)
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Locked => write!(f, "locked"),
            Self::Lost => write!(f, "lost"),
            Self::Suspicious => write!(f, "suspicious"),
        }
    }
}

/// One element of a `tracks` payload, as the backend sends it.
///
/// The backend serializes more than this (velocity, history, keypoints,
/// action, last_seen); those keys are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Per-observation identifier. Reconciliation keys on this.
    pub id: u64,

    /// Cross-frame identity. May be null before the tracker locks on.
    #[serde(default)]
    pub persistent_id: Option<String>,

    pub label: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub avg_confidence: f64,

    /// x1, y1, x2, y2 in source-frame pixels
    pub bbox: [f64; 4],

    #[serde(default)]
    pub status: DetectionStatus,

    #[serde(default)]
    pub lock_strength: f64,

    #[serde(default)]
    pub should_announce: bool,

    #[serde(default)]
    pub detection_count: u64,

    /// Backend clock, seconds since epoch.
    #[serde(default)]
    pub first_seen: Option<f64>,
}

/// A `TrackRecord` stamped with the client's receipt time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub id: u64,
    pub persistent_id: Option<String>,
    pub label: String,
    pub confidence: f64,
    pub avg_confidence: f64,
    pub bbox: [f64; 4],
    pub status: DetectionStatus,
    pub lock_strength: f64,
    pub should_announce: bool,
    pub detection_count: u64,
    pub first_seen: Option<f64>,
    /// Client wall clock at message receipt, milliseconds since epoch.
    /// Never taken from the payload.
    pub timestamp: u64,
}

impl Detection {
    pub fn stamp(record: TrackRecord, received_at_ms: u64) -> Self {
        Self {
            id: record.id,
            persistent_id: record.persistent_id,
            label: record.label,
            confidence: record.confidence,
            avg_confidence: record.avg_confidence,
            bbox: record.bbox,
            status: record.status,
            lock_strength: record.lock_strength,
            should_announce: record.should_announce,
            detection_count: record.detection_count,
            first_seen: record.first_seen,
            timestamp: received_at_ms,
        }
    }

    /// Operator-facing line used when a detection is flagged for announcement.
    pub fn announcement(&self) -> String {
        format!(
            "Object detected: {}. Tracking ID {}.",
            self.label,
            self.persistent_id.as_deref().unwrap_or("unassigned")
        )
    }
}

/// Lightweight projection for overlays. Only the last full snapshot is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

impl From<&TrackRecord> for Track {
    fn from(record: &TrackRecord) -> Self {
        Self {
            id: record.id,
            label: record.label.clone(),
            confidence: record.confidence,
            bbox: record.bbox,
        }
    }
}
