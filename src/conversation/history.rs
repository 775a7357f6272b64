//! Turn history with the alternation invariant
//!
//! Positions 0, 2, 4, ... are User turns and 1, 3, 5, ... are Assistant
//! turns. Every append checks this before mutating, so a rejected append
//! leaves the history untouched.

use super::{ContentBlock, Message, Role};
use thiserror::Error;

/// An append would break role alternation or the non-empty content rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("{0} message has no content blocks")]
    EmptyContent(Role),
    #[error("previous turn is still awaiting an assistant reply")]
    ConsecutiveUserTurn,
    #[error("assistant turn has no preceding user turn")]
    AssistantWithoutUserTurn,
    #[error("expected {expected} message, got {found}")]
    UnexpectedRole { expected: Role, found: Role },
}

/// Ordered dialogue history, owned by a single driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a User turn built from `blocks`
    ///
    /// # Errors
    ///
    /// Fails if `blocks` is empty or the previous turn is a User turn.
    pub fn append_user_turn(
        &mut self,
        blocks: Vec<ContentBlock>,
    ) -> Result<&Message, InvariantError> {
        if self.is_open() {
            return Err(InvariantError::ConsecutiveUserTurn);
        }
        if blocks.is_empty() {
            return Err(InvariantError::EmptyContent(Role::User));
        }
        Ok(self.push(Message::user(blocks)))
    }

    /// Append a finished Assistant turn
    ///
    /// # Errors
    ///
    /// Fails if `message` is not an Assistant message, has no content, or
    /// does not follow a User turn.
    pub fn append_assistant_turn(&mut self, message: Message) -> Result<&Message, InvariantError> {
        if message.role != Role::Assistant {
            return Err(InvariantError::UnexpectedRole {
                expected: Role::Assistant,
                found: message.role,
            });
        }
        if !self.is_open() {
            return Err(InvariantError::AssistantWithoutUserTurn);
        }
        if message.content.is_empty() {
            return Err(InvariantError::EmptyContent(Role::Assistant));
        }
        Ok(self.push(message))
    }

    /// Read-only view of every turn so far
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// True when the last turn is a User turn awaiting its reply
    pub fn is_open(&self) -> bool {
        self.messages.last().is_some_and(|m| m.role == Role::User)
    }

    /// Drop a trailing User turn left behind by a failed request
    ///
    /// Returns `None` and changes nothing when the conversation is not open.
    pub fn discard_open_turn(&mut self) -> Option<Message> {
        if self.is_open() {
            self.messages.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &self.messages[last]
    }
}
