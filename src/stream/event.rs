//! Events delivered by a streaming request

use crate::conversation::Role;

/// Boxed cause carried by callback failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One event of a streamed reply, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The reply has started; announces its author
    MessageStart { role: Role },
    /// Next piece of reply text, in final-text order
    ContentBlockDelta { text: String },
    /// The reply is complete
    MessageStop,
    /// An event the transport could not map
    Unknown { tag: String },
}

impl StreamEvent {
    pub fn start(role: Role) -> Self {
        StreamEvent::MessageStart { role }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::ContentBlockDelta { text: text.into() }
    }

    pub fn unknown(tag: impl Into<String>) -> Self {
        StreamEvent::Unknown { tag: tag.into() }
    }

    /// Short name used in logs and errors
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Unknown { tag } => tag,
        }
    }
}

/// Receives streaming side effects
///
/// `on_fragment` is the per-fragment display callback, called synchronously
/// once per delta. `on_unknown_event` is the diagnostic channel; the default
/// writes a warning to the log.
pub trait StreamObserver {
    /// # Errors
    ///
    /// A failure aborts accumulation; no message is produced.
    fn on_fragment(&mut self, fragment: &str) -> Result<(), BoxError>;

    fn on_unknown_event(&mut self, tag: &str) {
        tracing::warn!(tag = %tag, "Ignoring unknown stream event");
    }
}

impl<F> StreamObserver for F
where
    F: FnMut(&str) -> Result<(), BoxError>,
{
    fn on_fragment(&mut self, fragment: &str) -> Result<(), BoxError> {
        self(fragment)
    }
}
