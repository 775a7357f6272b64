//! Conversation model
//!
//! Content blocks, messages and the turn history sent to the model on every
//! request. The history enforces strict User/Assistant alternation.

mod content;
mod history;

#[cfg(test)]
mod proptests;

pub use content::{ContentBlock, ImageFormat, ImageSource, Message, Role};
pub use history::{Conversation, InvariantError};
