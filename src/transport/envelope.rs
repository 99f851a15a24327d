//! Push-stream envelope decoding.
//!
//! The backend sends JSON text frames shaped as
//! `{ "type": "event"|"tracks"|"telemetry", "data": <payload>, "frame": <int>? }`.
//! Payload shape depends on `type`:
//! - `event`: a single `Event` object
//! - `tracks`: an array of `TrackRecord` objects
//! - `telemetry`: free text, one `x y w h` row per tracked box

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::detect::TrackRecord;
use crate::Event;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("'{0}' message has no data")]
    MissingData(&'static str),

    #[error("'telemetry' message has no frame number")]
    MissingFrame,

    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    frame: Option<u64>,
}

/// A decoded push-stream message.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Event(Event),
    Tracks(Vec<TrackRecord>),
    Telemetry { frame: u64, text: String },
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::Tracks(_) => "tracks",
            Self::Telemetry { .. } => "telemetry",
        }
    }
}

/// Decode one text frame.
///
/// A missing or null `data` is rejected for every type, as is an
/// unrecognized `type`.
pub fn parse_stream_message(text: &str) -> Result<StreamMessage, DecodeError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;

    match raw.kind.as_str() {
        "event" => {
            let data = payload(raw.data, "event")?;
            let event = serde_json::from_value(data)
                .map_err(|source| DecodeError::Payload { kind: "event", source })?;
            Ok(StreamMessage::Event(event))
        }
        "tracks" => {
            let data = payload(raw.data, "tracks")?;
            let tracks = serde_json::from_value(data)
                .map_err(|source| DecodeError::Payload { kind: "tracks", source })?;
            Ok(StreamMessage::Tracks(tracks))
        }
        "telemetry" => {
            let data = payload(raw.data, "telemetry")?;
            let frame = raw.frame.ok_or(DecodeError::MissingFrame)?;
            let text = serde_json::from_value(data).map_err(|source| DecodeError::Payload {
                kind: "telemetry",
                source,
            })?;
            Ok(StreamMessage::Telemetry { frame, text })
        }
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

fn payload(data: Option<Value>, kind: &'static str) -> Result<Value, DecodeError> {
    match data {
        None | Some(Value::Null) => Err(DecodeError::MissingData(kind)),
        Some(value) => Ok(value),
    }
}

/// One row of telemetry text: top-left corner plus size, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// Parse telemetry text. Rows that are not four integers are skipped.
pub fn parse_telemetry_boxes(text: &str) -> Vec<TelemetryBox> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<i64> = line
                .split_whitespace()
                .map(|f| f.parse().ok())
                .collect::<Option<Vec<_>>>()?;
            match fields.as_slice() {
                [x, y, w, h] => Some(TelemetryBox {
                    x: *x,
                    y: *y,
                    w: *w,
                    h: *h,
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionStatus;

    const TRACKS_MESSAGE: &str = r#"{
        "type": "tracks",
        "data": [
            {"id": 1, "persistent_id": "P-1", "label": "person", "confidence": 0.9,
             "avg_confidence": 0.85, "bbox": [1, 2, 3, 4], "status": "active",
             "lock_strength": 0.2, "should_announce": true, "detection_count": 3,
             "first_seen": 1700000000.0},
            {"id": 2, "persistent_id": "P-2", "label": "car", "confidence": 0.7,
             "avg_confidence": 0.65, "bbox": [5, 6, 7, 8], "status": "lost",
             "lock_strength": 0.0, "should_announce": false, "detection_count": 9,
             "first_seen": 1700000001.0}
        ]
    }"#;

    #[test]
    fn decodes_tracks() {
        let msg = parse_stream_message(TRACKS_MESSAGE).expect("decode");
        match msg {
            StreamMessage::Tracks(tracks) => {
                assert_eq!(tracks.len(), 2);
                assert_eq!(tracks[1].status, DetectionStatus::Lost);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_event() {
        let raw = r#"{"type": "event", "data": {"id": "e1", "timestamp": "2026-10-14T10:00:00",
            "severity": "warning", "title": "Loitering", "description": "zone A"}}"#;
        let msg = parse_stream_message(raw).expect("decode");
        assert_eq!(msg.kind(), "event");
    }

    #[test]
    fn decodes_telemetry_with_frame() {
        let raw = r#"{"type": "telemetry", "frame": 120, "data": "10 20 30 40\n50 60 70 80"}"#;
        let msg = parse_stream_message(raw).expect("decode");
        assert_eq!(
            msg,
            StreamMessage::Telemetry {
                frame: 120,
                text: "10 20 30 40\n50 60 70 80".to_string()
            }
        );
    }

    #[test]
    fn telemetry_without_frame_is_rejected() {
        let err = parse_stream_message(r#"{"type": "telemetry", "data": "1 2 3 4"}"#)
            .expect_err("reject");
        assert!(matches!(err, DecodeError::MissingFrame));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse_stream_message(r#"{"type": "heartbeat", "data": {}}"#).expect_err("reject");
        assert!(matches!(err, DecodeError::UnknownType(t) if t == "heartbeat"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_stream_message("{not json").expect_err("reject");
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn null_data_is_rejected() {
        let err = parse_stream_message(r#"{"type": "tracks", "data": null}"#).expect_err("reject");
        assert!(matches!(err, DecodeError::MissingData("tracks")));
    }

    #[test]
    fn wrong_payload_shape_is_rejected() {
        let err =
            parse_stream_message(r#"{"type": "tracks", "data": {"id": 1}}"#).expect_err("reject");
        assert!(matches!(err, DecodeError::Payload { kind: "tracks", .. }));
    }

    #[test]
    fn parses_telemetry_rows_and_skips_garbage() {
        let boxes = parse_telemetry_boxes("10 20 30 40\nbad row\n1 2 3\n-5 0 12 9\n");
        assert_eq!(
            boxes,
            vec![
                TelemetryBox { x: 10, y: 20, w: 30, h: 40 },
                TelemetryBox { x: -5, y: 0, w: 12, h: 9 },
            ]
        );
    }
}
