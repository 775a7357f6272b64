//! Streaming response accumulator
//!
//! Folds an ordered sequence of stream events into one finished assistant
//! message, surfacing each text fragment to an observer as it arrives.

mod accumulator;
mod event;

#[cfg(test)]
mod proptests;

pub use accumulator::{
    AccumulateError, AccumulatorPhase, ProtocolSequenceError, StreamAccumulator,
};
pub use event::{BoxError, StreamEvent, StreamObserver};
