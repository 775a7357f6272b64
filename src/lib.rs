//! Multi-turn conversation client
//!
//! Keeps a strictly alternating User/Assistant history and turns either a
//! complete model reply or a stream of reply fragments into the next
//! assistant turn.

pub mod config;
pub mod conversation;
pub mod driver;
pub mod image;
pub mod llm;
pub mod stream;

pub use config::ChatConfig;
pub use conversation::{
    ContentBlock, Conversation, ImageFormat, ImageSource, InvariantError, Message, Role,
};
pub use driver::{run_turn, ResponseMode, TurnDriver, TurnError, TurnErrorKind};
pub use stream::{StreamAccumulator, StreamEvent, StreamObserver};
