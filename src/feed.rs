//! Bounded newest-first feeds for operator events and telemetry frames.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;

use crate::{Event, Severity};

/// Cap for backend-pushed events.
pub const MAX_EVENTS: usize = 50;
/// Cap for telemetry pseudo-events.
pub const MAX_TELEMETRY_EVENTS: usize = 20;

/// Newest-first list holding at most `cap` entries. Oldest are evicted first.
#[derive(Clone, Debug)]
pub struct BoundedFeed<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedFeed<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Prepend, then truncate to the cap.
    pub fn push_front(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.cap);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl BoundedFeed<Event> {
    /// Events with warning or critical severity, newest first.
    pub fn alerts(&self) -> Vec<&Event> {
        self.items.iter().filter(|e| e.severity.is_alert()).collect()
    }
}

/// Build the pseudo-event shown for a telemetry frame.
pub fn telemetry_event(frame: u64, text: &str, received_at_ms: u64) -> Event {
    Event {
        id: format!("telemetry-{}-{:016x}", frame, rand::random::<u64>()),
        timestamp: iso_timestamp(received_at_ms),
        severity: Severity::Info,
        title: format!("FRAME No {}", frame),
        description: text.to_string(),
        zone_id: None,
        track_id: None,
    }
}

/// Milliseconds since epoch as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_timestamp(ms: u64) -> String {
    let dt = i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default();
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
