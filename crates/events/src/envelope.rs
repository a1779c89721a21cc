use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a notification, carrying stream metadata.
///
/// This is the unit appended to the notification log and published on the
/// bus. One stream per entity: the registry has one stream, every store
/// ledger has its own.
///
/// Notes:
/// - **Append-only**: `sequence_number` is monotonically increasing per
///   stream, starting at 1.
/// - `payload` is the serialized notification body; the log keeps it as
///   `serde_json::Value` so one log can hold every stream type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    envelope_id: Uuid,

    stream_id: Uuid,
    stream_type: String,

    /// Monotonically increasing position in the entity stream.
    sequence_number: u64,

    kind: String,
    schema_version: u32,
    occurred_at: DateTime<Utc>,

    payload: P,
}

impl<P> Envelope<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        envelope_id: Uuid,
        stream_id: Uuid,
        stream_type: impl Into<String>,
        sequence_number: u64,
        kind: impl Into<String>,
        schema_version: u32,
        occurred_at: DateTime<Utc>,
        payload: P,
    ) -> Self {
        Self {
            envelope_id,
            stream_id,
            stream_type: stream_type.into(),
            sequence_number,
            kind: kind.into(),
            schema_version,
            occurred_at,
            payload,
        }
    }

    pub fn envelope_id(&self) -> Uuid {
        self.envelope_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}
