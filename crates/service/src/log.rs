//! In-memory append-only notification log.
//!
//! The durable audit trail behind the bus: one stream per entity (the
//! registry, each store ledger), per-stream monotonic sequence numbers
//! starting at 1. Payloads are stored as `serde_json::Value` so a single log
//! holds every stream type. Intended for tests/dev and as the layout
//! contract for a durable implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use marketplace_core::ExpectedVersion;
use marketplace_events::{Envelope, Notification};

/// A notification that has been decided but not yet appended.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub stream_id: Uuid,
    pub stream_type: String,
    pub kind: String,
    pub schema_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl PendingNotification {
    /// Capture a typed notification for appending.
    pub fn from_notification<N>(
        stream_id: Uuid,
        stream_type: impl Into<String>,
        notification: &N,
    ) -> Result<Self, serde_json::Error>
    where
        N: Notification + Serialize,
    {
        Ok(Self {
            stream_id,
            stream_type: stream_type.into(),
            kind: notification.kind().to_string(),
            schema_version: notification.schema_version(),
            occurred_at: notification.occurred_at(),
            payload: serde_json::to_value(notification)?,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Optimistic concurrency failure (stream moved underneath the appender).
    #[error("concurrency: {0}")]
    Concurrency(String),

    /// Malformed append batch (mixed streams, lock poisoning).
    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// In-memory append-only notification log.
///
/// Not optimized for performance; reads clone envelopes out.
#[derive(Debug, Default)]
pub struct NotificationLog {
    streams: RwLock<HashMap<Uuid, Vec<Envelope<JsonValue>>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[Envelope<JsonValue>]) -> u64 {
        stream.last().map(|e| e.sequence_number()).unwrap_or(0)
    }

    /// Append a batch to one stream, assigning sequence numbers.
    pub fn append(
        &self,
        pending: Vec<PendingNotification>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<Envelope<JsonValue>>, LogError> {
        if pending.is_empty() {
            return Ok(vec![]);
        }

        // All notifications must target the same stream.
        let stream_id = pending[0].stream_id;
        let stream_type = pending[0].stream_type.clone();
        for (idx, p) in pending.iter().enumerate() {
            if p.stream_id != stream_id || p.stream_type != stream_type {
                return Err(LogError::InvalidAppend(format!(
                    "batch contains multiple streams (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| LogError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(stream_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(LogError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(pending.len());
        for p in pending {
            let envelope = Envelope::new(
                Uuid::now_v7(),
                p.stream_id,
                p.stream_type,
                next,
                p.kind,
                p.schema_version,
                p.occurred_at,
                p.payload,
            );
            next += 1;
            stream.push(envelope.clone());
            committed.push(envelope);
        }

        Ok(committed)
    }

    /// Every envelope appended to one stream, in sequence order.
    pub fn read_stream(&self, stream_id: Uuid) -> Vec<Envelope<JsonValue>> {
        self.streams
            .read()
            .map(|streams| streams.get(&stream_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Last sequence number of a stream (0 when empty).
    pub fn stream_version(&self, stream_id: Uuid) -> u64 {
        self.streams
            .read()
            .map(|streams| {
                streams
                    .get(&stream_id)
                    .map(|s| Self::current_version(s))
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}
