//! Anthropic Messages API client

use super::{ConverseClient, EventStream, LlmError};
use crate::config::ChatConfig;
use crate::conversation::{ContentBlock, ImageSource, Message, Role};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_VERSION: &str = "2023-06-01";

/// Messages API client implementing both request modes
pub struct AnthropicClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    system: Option<String>,
}

impl AnthropicClient {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::unknown("Failed to create HTTP client").with_source(e))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: config.system.clone(),
        })
    }

    fn build_request(&self, history: &[Message], stream: bool) -> RequestBuilder {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: self.system.as_deref(),
            messages: history.iter().map(translate_message).collect(),
            stream,
        };

        let mut request = self
            .client
            .post(&self.base_url)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        request
    }
}

#[async_trait]
impl ConverseClient for AnthropicClient {
    async fn converse(&self, history: &[Message]) -> Result<Message, LlmError> {
        let response = self
            .build_request(history, false)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network("Failed to read response").with_source(e))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        normalize_response(parsed)
    }

    async fn converse_stream(&self, history: &[Message]) -> Result<EventStream, LlmError> {
        let mut source = EventSource::new(self.build_request(history, true))
            .map_err(|e| LlmError::invalid_request(format!("Cannot open event stream: {e}")))?;

        let stream = async_stream::stream! {
            let mut stopped = false;
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(message)) => {
                        let Some(mapped) = map_sse_event(&message.event, &message.data) else {
                            continue;
                        };
                        stopped = matches!(mapped, Ok(StreamEvent::MessageStop));
                        let done = stopped || mapped.is_err();
                        yield mapped;
                        if done {
                            break;
                        }
                    }
                    // A clean close is only a finished reply once message_stop arrived
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        if !stopped {
                            yield Err(LlmError::network("stream ended before message_stop"));
                        }
                        break;
                    }
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unable to read error body".to_string());
                        yield Err(classify_error(status, &body));
                        break;
                    }
                    Err(reqwest_eventsource::Error::Transport(e)) => {
                        yield Err(send_error(e));
                        break;
                    }
                    Err(e) => {
                        yield Err(LlmError::invalid_response(format!("Stream error: {e}")));
                        break;
                    }
                }
            }
            source.close();
        };

        Ok(Box::pin(stream))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn send_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network("Request timeout").with_source(e)
    } else if e.is_connect() {
        LlmError::network("Connection failed").with_source(e)
    } else {
        LlmError::unknown("Request failed").with_source(e)
    }
}

fn classify_error(status: StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::auth(body),
        429 => LlmError::rate_limit(body),
        400 => LlmError::invalid_request(body),
        500..=599 => LlmError::server_error(body),
        _ => LlmError::unknown(format!("HTTP {status}: {body}")),
    }
}

fn translate_message(msg: &Message) -> AnthropicMessage {
    let content = msg
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => AnthropicContentBlock::Text { text: text.clone() },
            ContentBlock::Image { format, source } => AnthropicContentBlock::Image {
                source: match source {
                    ImageSource::Bytes(bytes) => AnthropicImageSource::Base64 {
                        media_type: format.media_type(),
                        data: BASE64.encode(bytes),
                    },
                    ImageSource::Reference(url) => AnthropicImageSource::Url { url: url.clone() },
                },
            },
        })
        .collect();

    AnthropicMessage {
        role: msg.role.as_str(),
        content,
    }
}

fn parse_role(role: &str) -> Result<Role, LlmError> {
    match role {
        "assistant" => Ok(Role::Assistant),
        "user" => Ok(Role::User),
        other => Err(LlmError::invalid_response(format!("Unknown role: {other}"))),
    }
}

fn normalize_response(resp: AnthropicResponse) -> Result<Message, LlmError> {
    let role = parse_role(&resp.role)?;
    let content = resp
        .content
        .into_iter()
        .map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") => block
                .get("text")
                .and_then(Value::as_str)
                .map(ContentBlock::text)
                .ok_or_else(|| LlmError::invalid_response("Text block without text")),
            Some(other) => Err(LlmError::invalid_response(format!(
                "Unsupported content block in reply: {other}"
            ))),
            None => Err(LlmError::invalid_response("Content block without type")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        stop_reason = resp.stop_reason.as_deref().unwrap_or("none"),
        blocks = content.len(),
        "Reply received"
    );

    Ok(Message::new(role, content))
}

/// Map one server-sent event to a stream event
///
/// Returns `None` for bookkeeping events that carry nothing the
/// accumulator needs.
fn map_sse_event(event: &str, data: &str) -> Option<Result<StreamEvent, LlmError>> {
    let parse = |data: &str| {
        serde_json::from_str::<Value>(data)
            .map_err(|e| LlmError::invalid_response(format!("Malformed {event} event: {e}")))
    };

    match event {
        "message_start" => Some(parse(data).and_then(|v| {
            let role = v
                .pointer("/message/role")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::invalid_response("message_start without role"))?;
            Ok(StreamEvent::start(parse_role(role)?))
        })),
        "content_block_delta" => Some(parse(data).and_then(|v| {
            let delta = v
                .get("delta")
                .ok_or_else(|| LlmError::invalid_response("content_block_delta without delta"))?;
            match delta.get("type").and_then(Value::as_str) {
                Some("text_delta") => delta
                    .get("text")
                    .and_then(Value::as_str)
                    .map(StreamEvent::delta)
                    .ok_or_else(|| LlmError::invalid_response("text_delta without text")),
                Some(other) => Ok(StreamEvent::unknown(format!("content_block_delta.{other}"))),
                None => Err(LlmError::invalid_response("content_block_delta without type")),
            }
        })),
        "message_stop" => Some(Ok(StreamEvent::MessageStop)),
        "ping" | "content_block_start" | "content_block_stop" | "message_delta" => {
            tracing::trace!(event, "Skipping bookkeeping event");
            None
        }
        "error" => Some(Err(parse(data).map_or_else(
            |e| e,
            |v| {
                let message = v
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error")
                    .to_string();
                match v.pointer("/error/type").and_then(Value::as_str) {
                    Some("authentication_error" | "permission_error") => LlmError::auth(message),
                    Some("rate_limit_error") => LlmError::rate_limit(message),
                    Some("overloaded_error" | "api_error") => LlmError::server_error(message),
                    Some("invalid_request_error") => LlmError::invalid_request(message),
                    _ => LlmError::unknown(message),
                }
            },
        ))),
        other => Some(Ok(StreamEvent::unknown(other))),
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text { text: String },
    Image { source: AnthropicImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicImageSource {
    Base64 { media_type: &'static str, data: String },
    Url { url: String },
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    role: String,
    content: Vec<Value>,
    stop_reason: Option<String>,
}
