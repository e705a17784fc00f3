//! Event types for topic routing
//!
//! This module defines the identifiers used to address subscribers and the
//! events that are broadcast to them.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Hub-assigned identifier of a single subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An event published to a topic
///
/// Cheap to clone: the payload is a reference-counted, immutable `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Per-topic sequence number, starting at 1
    pub seq: u64,
    /// Wall-clock publish time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Opaque payload
    pub payload: Bytes,
}

impl Event {
    /// Create an event stamped with the current wall-clock time
    pub fn new(seq: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            seq,
            timestamp_ms: now_millis(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
