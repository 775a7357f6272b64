//! Accumulator state machine
//!
//! ```text
//! Idle --MessageStart--> RoleKnown --Delta--> Accumulating --MessageStop--> Finished
//!                            \_____________MessageStop______________________/
//! ```
//!
//! `Unknown` events are reported and leave the phase as it was. Anything
//! else out of order fails with a [`ProtocolSequenceError`]. After any error
//! the accumulator must be dropped.

use super::{BoxError, StreamEvent, StreamObserver};
use crate::conversation::{ContentBlock, Message, Role};
use thiserror::Error;

/// Events arrived in an order the protocol does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolSequenceError {
    #[error("content delta received before the message role was announced")]
    DeltaBeforeStart,
    #[error("message stop received before the message role was announced")]
    StopBeforeStart,
    #[error("message start received twice")]
    DuplicateStart,
    #[error("{event} received after message stop")]
    AfterStop { event: String },
    #[error("stream ended without announcing a message role")]
    MissingRole,
}

/// Accumulation failed; no message is produced
#[derive(Debug, Error)]
pub enum AccumulateError {
    #[error(transparent)]
    Sequence(#[from] ProtocolSequenceError),
    #[error("fragment callback failed")]
    Callback(#[source] BoxError),
}

/// Progress through one streamed reply
///
/// Every phase after `Idle` means a role was announced. `Accumulating`
/// means at least one fragment has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorPhase {
    Idle,
    RoleKnown,
    Accumulating,
    Finished,
}

/// Builds one assistant message from a stream of events
///
/// Holds the announced role, the text buffer and the current phase. It
/// lives for one streaming call only.
#[derive(Debug)]
pub struct StreamAccumulator {
    phase: AccumulatorPhase,
    role: Option<Role>,
    text: String,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            phase: AccumulatorPhase::Idle,
            role: None,
            text: String::new(),
        }
    }

    pub fn phase(&self) -> AccumulatorPhase {
        self.phase
    }

    /// Text gathered so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume one event
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::Sequence`] for an out-of-order event and
    /// [`AccumulateError::Callback`] when the observer rejects a fragment.
    pub fn apply(
        &mut self,
        event: StreamEvent,
        observer: &mut (impl StreamObserver + ?Sized),
    ) -> Result<(), AccumulateError> {
        use AccumulatorPhase::{Accumulating, Finished, Idle, RoleKnown};

        match (self.phase, event) {
            (_, StreamEvent::Unknown { tag }) => {
                observer.on_unknown_event(&tag);
            }

            (Idle, StreamEvent::MessageStart { role }) => {
                self.role = Some(role);
                self.phase = RoleKnown;
            }
            (Idle, StreamEvent::ContentBlockDelta { .. }) => {
                return Err(ProtocolSequenceError::DeltaBeforeStart.into());
            }
            (Idle, StreamEvent::MessageStop) => {
                return Err(ProtocolSequenceError::StopBeforeStart.into());
            }

            (RoleKnown | Accumulating, StreamEvent::ContentBlockDelta { text }) => {
                self.text.push_str(&text);
                self.phase = Accumulating;
                observer.on_fragment(&text).map_err(AccumulateError::Callback)?;
            }
            (RoleKnown | Accumulating, StreamEvent::MessageStop) => {
                self.phase = Finished;
            }
            (RoleKnown | Accumulating, StreamEvent::MessageStart { .. }) => {
                return Err(ProtocolSequenceError::DuplicateStart.into());
            }

            (Finished, event) => {
                return Err(ProtocolSequenceError::AfterStop {
                    event: event.kind().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Produce the finished message once the event sequence is exhausted
    ///
    /// A reply with no deltas yields a single empty text block. A stream
    /// that ends without `MessageStop` still yields what was gathered.
    ///
    /// # Errors
    ///
    /// Fails if no `MessageStart` was ever seen.
    pub fn finish(self) -> Result<Message, ProtocolSequenceError> {
        let role = self.role.ok_or(ProtocolSequenceError::MissingRole)?;
        if self.phase != AccumulatorPhase::Finished {
            tracing::warn!(
                phase = ?self.phase,
                chars = self.text.len(),
                "Stream ended without message stop"
            );
        }
        Ok(Message::new(role, vec![ContentBlock::Text(self.text)]))
    }
}
