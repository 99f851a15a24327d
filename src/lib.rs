//! ZentinelOS live telemetry client
//!
//! This crate consumes the push stream of the ZentinelOS perception backend and
//! turns it into a bounded, deduplicated view for operator tooling.
//!
//! # Architecture
//!
//! Detection, tracking and zone evaluation all happen in the backend. The
//! client owns exactly three things:
//!
//! 1. **Decoding**: JSON envelopes are decoded into a closed sum type at the
//!    boundary; anything else is logged and dropped.
//! 2. **Reconciliation**: `tracks` batches are stamped with receipt time and
//!    merged into at most ten detections keyed by id.
//! 3. **Connection control**: each consumer owns one socket and one timer,
//!    governed by a reconnect policy, and releases both on teardown.
//!
//! # Module Structure
//!
//! - `detect`: detection records, reconciliation, aggregates
//! - `feed`: bounded newest-first event feeds
//! - `transport`: envelope decoding and the blocking socket driver
//! - `session`: sans-IO connection policies and the teardown guard
//! - `state`: the two consumer views (detections, dashboard)
//! - `endpoint`, `config`: URL resolution and runtime configuration

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod detect;
pub mod endpoint;
pub mod feed;
pub mod session;
pub mod state;
pub mod transport;

pub use detect::{Detection, DetectionStatus, DetectionSummary, Track, TrackRecord};
pub use endpoint::{ApiBase, EndpointError};
pub use feed::{BoundedFeed, MAX_EVENTS, MAX_TELEMETRY_EVENTS};
pub use session::{Action, ConnectionPolicy, FallbackPolicy, ReconnectPolicy, Subscription};
pub use state::{DashboardView, DetectionView, StreamHandler};
pub use transport::{ClientHandle, DecodeError, LiveClient, StreamMessage};

/// Stream path on the backend.
pub const STREAM_PATH: &str = "/api/v1/ws";

/// Client wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// -------------------- Events --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn is_alert(self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }
}

/// Operator-facing log line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// ISO-8601
    pub timestamp: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

// -------------------- Zones --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    Restricted,
    Monitored,
    Transit,
    Safe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Operator-authored polygon region. Authored in the backend; listed here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub polygon: Vec<Point>,
    #[serde(default = "default_zone_active")]
    pub active: bool,
}

fn default_zone_active() -> bool {
    true
}
