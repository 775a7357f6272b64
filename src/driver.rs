//! Conversation driver
//!
//! Runs one request/response cycle per user input:
//!
//! 1. append the user turn (fails with no change on an invariant violation)
//! 2. send the history to the model, sync or streaming
//! 3. fold a streamed reply through the accumulator
//! 4. append the assistant turn
//!
//! If anything after step 1 fails, the user turn stays recorded and no
//! assistant turn is appended. The caller must resolve that open turn, for
//! example with [`Conversation::discard_open_turn`], before the next turn.

mod error;

#[cfg(test)]
mod testing;

pub use error::{TurnError, TurnErrorKind};

use crate::conversation::{ContentBlock, Conversation, Message};
use crate::llm::{ConverseClient, LlmError};
use crate::stream::{StreamAccumulator, StreamEvent, StreamObserver};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// How replies are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// One complete reply per request
    #[default]
    Sync,
    /// Reply text arrives as incremental fragments
    Streaming,
}

/// Owns the model client and request mode for a session
pub struct TurnDriver<C> {
    client: C,
    mode: ResponseMode,
}

impl<C: ConverseClient> TurnDriver<C> {
    pub fn new(client: C, mode: ResponseMode) -> Self {
        Self { client, mode }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one turn to completion
    ///
    /// # Errors
    ///
    /// See [`TurnError`]; the conversation never breaks alternation.
    pub async fn run_turn<'c, O>(
        &self,
        conversation: &'c mut Conversation,
        blocks: Vec<ContentBlock>,
        observer: &mut O,
    ) -> Result<&'c Message, TurnError>
    where
        O: StreamObserver + ?Sized,
    {
        run_turn(conversation, blocks, &self.client, self.mode, observer).await
    }

    /// Run one turn, giving up when `cancel` fires
    ///
    /// # Errors
    ///
    /// As [`TurnDriver::run_turn`], plus [`TurnError::Cancelled`].
    pub async fn run_turn_cancellable<'c, O>(
        &self,
        conversation: &'c mut Conversation,
        blocks: Vec<ContentBlock>,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> Result<&'c Message, TurnError>
    where
        O: StreamObserver + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }
        conversation.append_user_turn(blocks)?;

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!(turns = conversation.len(), "Turn cancelled; user turn left open");
                return Err(TurnError::Cancelled);
            }
            reply = request_reply(conversation.history(), &self.client, self.mode, observer) => {
                reply
            }
        };

        finish_turn(conversation, reply)
    }
}

/// Run one turn against `client`
///
/// # Errors
///
/// See [`TurnError`]. An `Invariant` error from the user append leaves the
/// conversation unchanged; any later failure leaves the user turn open.
pub async fn run_turn<'c, C, O>(
    conversation: &'c mut Conversation,
    blocks: Vec<ContentBlock>,
    client: &C,
    mode: ResponseMode,
    observer: &mut O,
) -> Result<&'c Message, TurnError>
where
    C: ConverseClient + ?Sized,
    O: StreamObserver + ?Sized,
{
    conversation.append_user_turn(blocks)?;
    let reply = request_reply(conversation.history(), client, mode, observer).await;
    finish_turn(conversation, reply)
}

/// Fold a reply stream into one message
///
/// # Errors
///
/// A transport error item fails with [`TurnError::Request`]; sequence and
/// observer failures map to their own kinds. No message is produced on
/// failure.
pub async fn accumulate<S, O>(mut events: S, observer: &mut O) -> Result<Message, TurnError>
where
    S: Stream<Item = Result<StreamEvent, LlmError>> + Unpin,
    O: StreamObserver + ?Sized,
{
    let mut acc = StreamAccumulator::new();
    while let Some(event) = events.next().await {
        acc.apply(event?, observer)?;
    }
    Ok(acc.finish()?)
}

async fn request_reply<C, O>(
    history: &[Message],
    client: &C,
    mode: ResponseMode,
    observer: &mut O,
) -> Result<Message, TurnError>
where
    C: ConverseClient + ?Sized,
    O: StreamObserver + ?Sized,
{
    tracing::debug!(model = %client.model_id(), ?mode, turns = history.len(), "Requesting reply");
    match mode {
        ResponseMode::Sync => Ok(client.converse(history).await?),
        ResponseMode::Streaming => {
            let events = client.converse_stream(history).await?;
            accumulate(events, observer).await
        }
    }
}

fn finish_turn(
    conversation: &mut Conversation,
    reply: Result<Message, TurnError>,
) -> Result<&Message, TurnError> {
    let message = match reply {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(kind = ?e.kind(), error = %e, "Turn failed; user turn left open");
            return Err(e);
        }
    };
    Ok(conversation.append_assistant_turn(message)?)
}
