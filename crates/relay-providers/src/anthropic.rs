//! Anthropic Messages API provider.
//!
//! Implements streaming completions via `POST /v1/messages` with
//! `stream: true`, mapping the SSE events onto [`ModelStreamEvent`]s.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use relay_core::event::{BlockDelta, BlockStart};
use relay_core::types::{Role, StopReason};

use crate::sse::{SseEvent, parse_sse_response};
use crate::{CompletionRequest, LlmProvider, ModelStream, ModelStreamEvent};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    pub base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

// --- Anthropic stream event types ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: MessageInfo,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockInfo,
    },
    ContentBlockDelta {
        index: usize,
        delta: DeltaInfo,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaInfo,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorInfo,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockInfo {
    Text {},
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaInfo {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorInfo {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Build the JSON body for a streaming Messages request.
pub fn build_request_body(request: &CompletionRequest) -> serde_json::Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": request.messages,
        "stream": true,
    });
    if let Some(ref system) = request.system {
        body["system"] = json!(system);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    body
}

/// Map one SSE event from the Messages API. `None` means the event carries
/// nothing the agent needs (pings, message_stop, unknown types).
pub fn parse_anthropic_event(event: &SseEvent) -> Option<anyhow::Result<ModelStreamEvent>> {
    let parsed: StreamEvent = match serde_json::from_str(&event.data) {
        Ok(e) => e,
        Err(e) => {
            return Some(Err(anyhow::anyhow!(
                "malformed Anthropic stream event: {e}"
            )));
        }
    };

    let mapped = match parsed {
        StreamEvent::MessageStart { message } => ModelStreamEvent::MessageStart {
            role: message.role,
        },
        StreamEvent::ContentBlockStart {
            index,
            content_block,
        } => ModelStreamEvent::ContentBlockStart {
            index,
            start: match content_block {
                ContentBlockInfo::Text {} => BlockStart::Text,
                ContentBlockInfo::ToolUse { id, name } => BlockStart::ToolUse {
                    tool_use_id: id,
                    name,
                },
                ContentBlockInfo::Other => BlockStart::Other,
            },
        },
        StreamEvent::ContentBlockDelta { index, delta } => ModelStreamEvent::ContentBlockDelta {
            index,
            delta: match delta {
                DeltaInfo::TextDelta { text } => BlockDelta::Text { text },
                DeltaInfo::InputJsonDelta { partial_json } => BlockDelta::ToolUseInput {
                    input: partial_json,
                },
                DeltaInfo::ThinkingDelta { thinking } => BlockDelta::Reasoning { text: thinking },
                DeltaInfo::Other => BlockDelta::Other,
            },
        },
        StreamEvent::ContentBlockStop { index } => ModelStreamEvent::ContentBlockStop { index },
        StreamEvent::MessageDelta { delta } => ModelStreamEvent::MessageStop {
            stop_reason: StopReason::parse(delta.stop_reason.as_deref()?),
        },
        StreamEvent::Error { error } => {
            return Some(Err(anyhow::anyhow!(
                "Anthropic stream error ({}): {}",
                error.error_type,
                error.message
            )));
        }
        StreamEvent::MessageStop | StreamEvent::Ping | StreamEvent::Unknown => {
            trace!(event = ?event.event, "Skipping Anthropic stream event");
            return None;
        }
    };
    Some(Ok(mapped))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &CompletionRequest) -> anyhow::Result<ModelStream> {
        let body = build_request_body(request);

        debug!(model = %request.model, base_url = %self.base_url, "Streaming Anthropic Messages API");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {status}: {body}");
        }

        let events = parse_sse_response(response).filter_map(|item| async move {
            match item {
                Ok(sse_event) => parse_anthropic_event(&sse_event),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(events))
    }
}
