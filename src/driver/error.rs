//! Turn failure types

use crate::conversation::InvariantError;
use crate::llm::LlmError;
use crate::stream::{AccumulateError, BoxError, ProtocolSequenceError};
use thiserror::Error;

/// Why a turn failed
///
/// Only `Invariant` failures raised before the request leave the
/// conversation unchanged; every other kind leaves the user turn open.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("conversation invariant violated")]
    Invariant(#[from] InvariantError),
    #[error("malformed response stream")]
    ProtocolSequence(#[from] ProtocolSequenceError),
    #[error("request to the model failed")]
    Request(#[from] LlmError),
    #[error("fragment callback failed")]
    Callback(#[source] BoxError),
    #[error("turn cancelled")]
    Cancelled,
}

/// Error kind without the payload, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnErrorKind {
    Invariant,
    ProtocolSequence,
    Request,
    Callback,
    Cancelled,
}

impl TurnError {
    pub fn kind(&self) -> TurnErrorKind {
        match self {
            TurnError::Invariant(_) => TurnErrorKind::Invariant,
            TurnError::ProtocolSequence(_) => TurnErrorKind::ProtocolSequence,
            TurnError::Request(_) => TurnErrorKind::Request,
            TurnError::Callback(_) => TurnErrorKind::Callback,
            TurnError::Cancelled => TurnErrorKind::Cancelled,
        }
    }
}

impl From<AccumulateError> for TurnError {
    fn from(e: AccumulateError) -> Self {
        match e {
            AccumulateError::Sequence(e) => TurnError::ProtocolSequence(e),
            AccumulateError::Callback(cause) => TurnError::Callback(cause),
        }
    }
}
