//! Deterministic provider that replays queued turns.
//!
//! Used by tests and by `provider: "scripted"` for running the service
//! without network access. Once the queue is drained it echoes the latest
//! user input back as plain text.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use relay_core::event::{BlockDelta, BlockStart};
use relay_core::types::{ContentBlock, Role, StopReason};

use crate::{CompletionRequest, LlmProvider, ModelStream, ModelStreamEvent};

/// One scripted model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedTurn {
    /// A text reply streamed as the given chunks.
    Text(Vec<String>),
    /// A single tool call.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The request itself fails before any event is produced.
    Fail(String),
    /// Streams `chunks` of text, then fails.
    FailMidStream { chunks: Vec<String>, message: String },
    /// Streams `chunks` of text and ends without a stop reason.
    Truncated(Vec<String>),
}

impl ScriptedTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(vec![text.into()])
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider with an empty queue; every call echoes.
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn with_turn(mut self, turn: ScriptedTurn) -> Self {
        self.turns.get_mut().push_back(turn);
        self
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

/// Text of the most recent user message: its tool results if it carries any,
/// otherwise its text blocks.
fn echo_reply(request: &CompletionRequest) -> String {
    let Some(last) = request.messages.iter().rev().find(|m| m.role == Role::User) else {
        return String::new();
    };
    let results: Vec<&str> = last
        .content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    if results.is_empty() {
        last.text()
    } else {
        results.join("\n")
    }
}

fn text_events(chunks: Vec<String>) -> Vec<ModelStreamEvent> {
    let mut events = vec![
        ModelStreamEvent::MessageStart {
            role: Role::Assistant,
        },
        ModelStreamEvent::ContentBlockStart {
            index: 0,
            start: BlockStart::Text,
        },
    ];
    events.extend(chunks.into_iter().map(|text| ModelStreamEvent::ContentBlockDelta {
        index: 0,
        delta: BlockDelta::Text { text },
    }));
    events
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &CompletionRequest) -> anyhow::Result<ModelStream> {
        self.requests.lock().await.push(request.clone());
        let turn = self.turns.lock().await.pop_front();
        let turn = turn.unwrap_or_else(|| ScriptedTurn::text(echo_reply(request)));
        debug!(?turn, "Replaying scripted turn");

        let items: Vec<anyhow::Result<ModelStreamEvent>> = match turn {
            ScriptedTurn::Text(chunks) => {
                let mut events = text_events(chunks);
                events.push(ModelStreamEvent::ContentBlockStop { index: 0 });
                events.push(ModelStreamEvent::MessageStop {
                    stop_reason: StopReason::EndTurn,
                });
                events.into_iter().map(Ok).collect()
            }
            ScriptedTurn::ToolUse { id, name, input } => vec![
                ModelStreamEvent::MessageStart {
                    role: Role::Assistant,
                },
                ModelStreamEvent::ContentBlockStart {
                    index: 0,
                    start: BlockStart::ToolUse {
                        tool_use_id: id,
                        name,
                    },
                },
                ModelStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: BlockDelta::ToolUseInput {
                        input: input.to_string(),
                    },
                },
                ModelStreamEvent::ContentBlockStop { index: 0 },
                ModelStreamEvent::MessageStop {
                    stop_reason: StopReason::ToolUse,
                },
            ]
            .into_iter()
            .map(Ok)
            .collect(),
            ScriptedTurn::Fail(message) => anyhow::bail!(message),
            ScriptedTurn::FailMidStream { chunks, message } => {
                let mut items: Vec<_> = text_events(chunks).into_iter().map(Ok).collect();
                items.push(Err(anyhow::anyhow!(message)));
                items
            }
            ScriptedTurn::Truncated(chunks) => text_events(chunks).into_iter().map(Ok).collect(),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }
}
