//! Consumer views fed by decoded stream messages.
//!
//! Two consumers exist side by side, each with its own socket:
//! - `DetectionView` tracks reconciled detections and announcements
//! - `DashboardView` keeps the event feeds and the latest track snapshot
//!
//! Both may be attached to the same backend at once. The duplicated socket is
//! accepted; the two views never share state.

use crate::detect::{self, Detection, DetectionSummary, Track};
use crate::feed::{telemetry_event, BoundedFeed, MAX_EVENTS, MAX_TELEMETRY_EVENTS};
use crate::transport::{parse_telemetry_boxes, StreamMessage, TelemetryBox};
use crate::Event;

pub trait StreamHandler: Send {
    /// Apply one message received at `received_at_ms`. Returns whether the
    /// view changed; message types the view does not consume return false.
    fn apply(&mut self, message: StreamMessage, received_at_ms: u64) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct DetectionView {
    detections: Vec<Detection>,
    latest: Option<Detection>,
    total: u64,
}

impl DetectionView {
    /// Reconciled list, at most `MAX_DETECTIONS` entries.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Live projection of the reconciled list.
    pub fn active_detections(&self) -> Vec<Detection> {
        detect::active(&self.detections)
    }

    pub fn latest_detection(&self) -> Option<&Detection> {
        self.latest.as_ref()
    }

    /// Batches that carried at least one announced record.
    pub fn total_detections(&self) -> u64 {
        self.total
    }

    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::compute(&self.active_detections(), self.total)
    }
}

impl StreamHandler for DetectionView {
    fn apply(&mut self, message: StreamMessage, received_at_ms: u64) -> bool {
        let StreamMessage::Tracks(records) = message else {
            return false;
        };

        let batch: Vec<Detection> = records
            .into_iter()
            .map(|record| Detection::stamp(record, received_at_ms))
            .collect();

        self.detections = detect::reconcile(&batch, &self.detections);

        if let Some(announced) = detect::first_announced(&batch) {
            log::info!("{}", announced.announcement());
            self.latest = Some(announced.clone());
            self.total += 1;
        }
        true
    }
}

#[derive(Clone, Debug)]
pub struct DashboardView {
    events: BoundedFeed<Event>,
    telemetry: BoundedFeed<Event>,
    telemetry_boxes: Vec<TelemetryBox>,
    tracks: Vec<Track>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::with_caps(MAX_EVENTS, MAX_TELEMETRY_EVENTS)
    }
}

impl DashboardView {
    pub fn with_caps(event_cap: usize, telemetry_cap: usize) -> Self {
        Self {
            events: BoundedFeed::new(event_cap),
            telemetry: BoundedFeed::new(telemetry_cap),
            telemetry_boxes: Vec::new(),
            tracks: Vec::new(),
        }
    }

    pub fn events(&self) -> &BoundedFeed<Event> {
        &self.events
    }

    pub fn telemetry(&self) -> &BoundedFeed<Event> {
        &self.telemetry
    }

    /// Boxes parsed from the most recent telemetry frame.
    pub fn telemetry_boxes(&self) -> &[TelemetryBox] {
        &self.telemetry_boxes
    }

    /// Last full `tracks` snapshot.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn alerts(&self) -> Vec<&Event> {
        self.events.alerts()
    }
}

impl StreamHandler for DashboardView {
    fn apply(&mut self, message: StreamMessage, received_at_ms: u64) -> bool {
        match message {
            StreamMessage::Event(event) => {
                if event.severity.is_alert() {
                    log::warn!("[{:?}] {}: {}", event.severity, event.title, event.description);
                }
                self.events.push_front(event);
            }
            StreamMessage::Tracks(records) => {
                self.tracks = records.iter().map(Track::from).collect();
            }
            StreamMessage::Telemetry { frame, text } => {
                self.telemetry_boxes = parse_telemetry_boxes(&text);
                self.telemetry
                    .push_front(telemetry_event(frame, &text, received_at_ms));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectionStatus, TrackRecord, MAX_DETECTIONS};
    use crate::Severity;

    fn record(id: u64, status: DetectionStatus, announce: bool) -> TrackRecord {
        TrackRecord {
            id,
            persistent_id: Some(format!("P-{}", id)),
            label: "person".to_string(),
            confidence: 0.9,
            avg_confidence: 0.9,
            bbox: [0.0, 0.0, 1.0, 1.0],
            status,
            lock_strength: 0.0,
            should_announce: announce,
            detection_count: 1,
            first_seen: Some(1.0),
        }
    }

    fn event(id: &str, severity: Severity) -> Event {
        Event {
            id: id.to_string(),
            timestamp: "2026-10-14T10:00:00".to_string(),
            severity,
            title: id.to_string(),
            description: String::new(),
            zone_id: None,
            track_id: None,
        }
    }

    #[test]
    fn stamps_every_detection_with_receipt_time() {
        let mut view = DetectionView::default();
        view.apply(
            StreamMessage::Tracks(vec![
                record(1, DetectionStatus::Active, false),
                record(2, DetectionStatus::Locked, false),
            ]),
            4242,
        );
        assert!(view.detections().iter().all(|d| d.timestamp == 4242));
    }

    #[test]
    fn total_increments_once_per_flagged_batch() {
        let mut view = DetectionView::default();
        view.apply(
            StreamMessage::Tracks(vec![
                record(1, DetectionStatus::Active, true),
                record(2, DetectionStatus::Active, true),
                record(3, DetectionStatus::Active, true),
            ]),
            10,
        );
        assert_eq!(view.total_detections(), 1);
        assert_eq!(view.latest_detection().map(|d| d.id), Some(1));

        view.apply(
            StreamMessage::Tracks(vec![record(4, DetectionStatus::Active, false)]),
            20,
        );
        assert_eq!(view.total_detections(), 1);
        assert_eq!(view.latest_detection().map(|d| d.id), Some(1));

        view.apply(
            StreamMessage::Tracks(vec![record(5, DetectionStatus::Active, true)]),
            30,
        );
        assert_eq!(view.total_detections(), 2);
        assert_eq!(view.latest_detection().map(|d| d.id), Some(5));
    }

    #[test]
    fn repeated_batches_stay_bounded() {
        let mut view = DetectionView::default();
        for round in 0..6u64 {
            let batch = (0..4)
                .map(|i| record(round * 4 + i, DetectionStatus::Active, false))
                .collect();
            view.apply(StreamMessage::Tracks(batch), round);
            assert!(view.detections().len() <= MAX_DETECTIONS);
        }
        assert_eq!(view.detections()[0].id, 20);
    }

    #[test]
    fn detection_view_ignores_other_messages() {
        let mut view = DetectionView::default();
        assert!(!view.apply(StreamMessage::Event(event("e", Severity::Info)), 1));
        assert!(!view.apply(
            StreamMessage::Telemetry {
                frame: 1,
                text: String::new()
            },
            1
        ));
        assert!(view.detections().is_empty());
    }

    #[test]
    fn active_projection_leaves_canonical_list_alone() {
        let mut view = DetectionView::default();
        view.apply(
            StreamMessage::Tracks(vec![
                record(1, DetectionStatus::Lost, false),
                record(2, DetectionStatus::Suspicious, false),
            ]),
            1,
        );
        assert_eq!(view.active_detections().len(), 1);
        assert_eq!(view.detections().len(), 2);
        assert_eq!(view.summary().active, 1);
    }

    #[test]
    fn dashboard_feeds_are_capped_independently() {
        let mut view = DashboardView::default();
        for i in 0..60 {
            view.apply(
                StreamMessage::Event(event(&format!("e{}", i), Severity::Info)),
                i,
            );
        }
        for frame in 0..30 {
            view.apply(
                StreamMessage::Telemetry {
                    frame,
                    text: "1 2 3 4".to_string(),
                },
                frame,
            );
        }
        assert_eq!(view.events().len(), MAX_EVENTS);
        assert_eq!(view.telemetry().len(), MAX_TELEMETRY_EVENTS);
        assert_eq!(view.events().latest().map(|e| e.id.as_str()), Some("e59"));
        assert_eq!(
            view.telemetry().latest().map(|e| e.title.as_str()),
            Some("FRAME No 29")
        );
    }

    #[test]
    fn telemetry_boxes_follow_the_latest_frame() {
        let mut view = DashboardView::default();
        view.apply(
            StreamMessage::Telemetry {
                frame: 1,
                text: "10 20 30 40\n50 60 70 80".to_string(),
            },
            1,
        );
        assert_eq!(view.telemetry_boxes().len(), 2);

        view.apply(
            StreamMessage::Telemetry {
                frame: 2,
                text: "5 5 10 10\nnoise".to_string(),
            },
            2,
        );
        assert_eq!(
            view.telemetry_boxes(),
            &[TelemetryBox { x: 5, y: 5, w: 10, h: 10 }]
        );
        assert_eq!(view.telemetry().len(), 2);
    }

    #[test]
    fn dashboard_replaces_track_snapshot() {
        let mut view = DashboardView::default();
        view.apply(
            StreamMessage::Tracks(vec![
                record(1, DetectionStatus::Active, false),
                record(2, DetectionStatus::Active, false),
            ]),
            1,
        );
        view.apply(
            StreamMessage::Tracks(vec![record(3, DetectionStatus::Active, false)]),
            2,
        );
        let ids: Vec<u64> = view.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn dashboard_alerts_projection() {
        let mut view = DashboardView::default();
        view.apply(StreamMessage::Event(event("a", Severity::Info)), 1);
        view.apply(StreamMessage::Event(event("b", Severity::Critical)), 2);
        view.apply(StreamMessage::Event(event("c", Severity::Warning)), 3);
        let ids: Vec<&str> = view.alerts().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
