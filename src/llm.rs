//! Model request collaborators
//!
//! The conversation core talks to the remote model only through
//! [`ConverseClient`]: one call for a complete reply, one for a stream of
//! reply events.

mod anthropic;
mod error;

pub use anthropic::AnthropicClient;
pub use error::{LlmError, LlmErrorKind};

use crate::conversation::Message;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Ordered reply events; an `Err` item ends the stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Request/response boundary to the remote model
#[async_trait]
pub trait ConverseClient: Send + Sync {
    /// Request a complete reply to `history`
    ///
    /// On success the message has the Assistant role and non-empty content.
    async fn converse(&self, history: &[Message]) -> Result<Message, LlmError>;

    /// Request a streamed reply to `history`
    ///
    /// A normally completed stream ends with `MessageStop`.
    async fn converse_stream(&self, history: &[Message]) -> Result<EventStream, LlmError>;

    /// Model identifier, for logs
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ConverseClient + ?Sized> ConverseClient for Arc<T> {
    async fn converse(&self, history: &[Message]) -> Result<Message, LlmError> {
        (**self).converse(history).await
    }

    async fn converse_stream(&self, history: &[Message]) -> Result<EventStream, LlmError> {
        (**self).converse_stream(history).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for model clients
pub struct LoggingClient<C> {
    inner: C,
}

impl<C: ConverseClient> LoggingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    fn log_failure(&self, call: &str, duration: std::time::Duration, e: &LlmError) {
        tracing::error!(
            model = %self.inner.model_id(),
            call,
            duration_ms = %duration.as_millis(),
            kind = ?e.kind,
            error = %e.message,
            "LLM request failed"
        );
    }
}

#[async_trait]
impl<C: ConverseClient> ConverseClient for LoggingClient<C> {
    async fn converse(&self, history: &[Message]) -> Result<Message, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.converse(history).await;
        let duration = start.elapsed();

        match &result {
            Ok(message) => {
                tracing::info!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    turns = history.len(),
                    blocks = message.content.len(),
                    "LLM request completed"
                );
            }
            Err(e) => self.log_failure("converse", duration, e),
        }

        result
    }

    async fn converse_stream(&self, history: &[Message]) -> Result<EventStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.converse_stream(history).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    turns = history.len(),
                    "LLM stream opened"
                );
            }
            Err(e) => self.log_failure("converse_stream", duration, e),
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
