//! Mock model client for driver tests

use crate::conversation::Message;
use crate::llm::{ConverseClient, EventStream, LlmError};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply
pub enum MockReply {
    Message(Result<Message, LlmError>),
    Stream(Vec<Result<StreamEvent, LlmError>>),
    /// Emits the events, then never yields again
    StalledStream(Vec<StreamEvent>),
    /// The request itself never completes
    Pending,
}

/// Client that returns queued replies and records every history it was sent
pub struct MockClient {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, reply: MockReply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, history: &[Message]) -> Option<MockReply> {
        self.requests.lock().unwrap().push(history.to_vec());
        self.replies.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ConverseClient for MockClient {
    async fn converse(&self, history: &[Message]) -> Result<Message, LlmError> {
        match self.next_reply(history) {
            Some(MockReply::Message(reply)) => reply,
            Some(MockReply::Pending) => futures::future::pending().await,
            Some(_) => panic!("stream reply queued for a sync request"),
            None => Err(LlmError::network("No mock response queued")),
        }
    }

    async fn converse_stream(&self, history: &[Message]) -> Result<EventStream, LlmError> {
        match self.next_reply(history) {
            Some(MockReply::Stream(events)) => Ok(Box::pin(futures::stream::iter(events))),
            Some(MockReply::StalledStream(events)) => Ok(Box::pin(
                futures::stream::iter(events.into_iter().map(Ok)).chain(futures::stream::pending()),
            )),
            Some(MockReply::Message(Err(e))) => Err(e),
            Some(MockReply::Pending) => futures::future::pending().await,
            Some(MockReply::Message(Ok(_))) => panic!("message reply queued for a stream request"),
            None => Err(LlmError::network("No mock response queued")),
        }
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}
