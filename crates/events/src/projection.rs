//! Projection support (read model builders).
//!
//! Read models are **disposable**; the notification log is the source of
//! truth. This module provides deterministic replay and cursor tracking
//! without making storage assumptions.

use uuid::Uuid;

use crate::Envelope;

/// A projection builds a read model from an append-only notification stream.
///
/// Projections must be **idempotent**: applying the same envelope twice must
/// produce the same read model. The `ProjectionRunner` helps by tracking
/// sequence numbers and rejecting replays, but projections should still be
/// designed to tolerate duplicates at the domain level (the bus delivers
/// at-least-once).
pub trait Projection {
    type Payload;

    /// Apply a single envelope to the projection, updating the read model.
    fn apply(&mut self, envelope: &Envelope<Self::Payload>);
}

/// Tracks projection progress for a single stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamCursor {
    stream_id: Uuid,
    last_sequence_number: u64,
}

impl StreamCursor {
    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    StreamMismatch { expected: Uuid, found: Uuid },
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Runs envelopes through a projection and tracks progress.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursor: Option<StreamCursor>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursor: None,
        }
    }

    /// Create a runner pinned to a specific stream.
    ///
    /// This prevents accidentally starting a projection with an envelope
    /// from the wrong stream.
    pub fn new_for_stream(stream_id: Uuid, projection: P) -> Self {
        Self {
            projection,
            cursor: Some(StreamCursor {
                stream_id,
                last_sequence_number: 0,
            }),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Current cursor for this projection (if any envelopes were applied).
    pub fn cursor(&self) -> Option<StreamCursor> {
        self.cursor
    }

    /// Apply a single envelope, enforcing stream consistency and monotonic
    /// sequencing. A duplicate delivery surfaces as `NonMonotonicSequence`;
    /// callers following at-least-once semantics may treat that as a skip.
    pub fn apply(&mut self, envelope: &Envelope<P::Payload>) -> Result<(), ProjectionError> {
        let found_stream = envelope.stream_id();
        let found_seq = envelope.sequence_number();

        match self.cursor {
            None => {
                self.projection.apply(envelope);
                self.cursor = Some(StreamCursor {
                    stream_id: found_stream,
                    last_sequence_number: found_seq,
                });
                Ok(())
            }
            Some(mut c) => {
                if c.stream_id != found_stream {
                    return Err(ProjectionError::StreamMismatch {
                        expected: c.stream_id,
                        found: found_stream,
                    });
                }
                if found_seq <= c.last_sequence_number {
                    return Err(ProjectionError::NonMonotonicSequence {
                        last: c.last_sequence_number,
                        found: found_seq,
                    });
                }

                self.projection.apply(envelope);
                c.last_sequence_number = found_seq;
                self.cursor = Some(c);
                Ok(())
            }
        }
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a Envelope<P::Payload>>,
    ) -> Result<(), ProjectionError>
    where
        P::Payload: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }
}
