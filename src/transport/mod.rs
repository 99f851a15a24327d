//! Transport layer for the backend push stream.
//!
//! This module decodes stream envelopes into typed messages and drives a
//! `Subscription` over a real WebSocket connection.

mod client;
pub mod envelope;

pub use client::{ClientHandle, LiveClient};
pub use envelope::{
    parse_stream_message, parse_telemetry_boxes, DecodeError, StreamMessage, TelemetryBox,
};
