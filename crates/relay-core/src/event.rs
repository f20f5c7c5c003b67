//! Lifecycle and content events emitted by the agent during one invocation.
//!
//! Events for one invocation arrive in bracket order: every `Before*` precedes
//! its matching `After*`, and a block's [`AgentEvent::ContentBlockStart`]
//! precedes any [`AgentEvent::ContentBlockDelta`] for the same index.
//! Consumers must tolerate variants they do not care about; tags that are not
//! recognised at all deserialize to [`AgentEvent::Unknown`].

use serde::{Deserialize, Serialize};

use crate::types::{Message, StopReason, ToolCall, ToolCallResult};

/// Events emitted by the agent facade during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Start of one full agent run.
    BeforeInvocation { invocation_id: String },

    /// A model request is about to be sent.
    BeforeModelCall { cycle: u32 },

    /// The model finished responding; carries the assembled message.
    AfterModelCall {
        cycle: u32,
        message: Message,
        stop_reason: StopReason,
    },

    /// The run is about to execute one or more tool calls.
    BeforeTools { calls: Vec<ToolCall> },

    /// All tool calls of the current cycle have completed.
    AfterTools { results: Vec<ToolCallResult> },

    ContentBlockStart { index: usize, start: BlockStart },

    ContentBlockDelta { index: usize, delta: BlockDelta },

    ContentBlockStop { index: usize },

    /// End of the run.
    AfterInvocation { stop_reason: StopReason },

    #[serde(other)]
    Unknown,
}

/// Kind of content block being opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text,
    ToolUse { tool_use_id: String, name: String },
    #[serde(other)]
    Other,
}

/// Incremental content for an open block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    Text { text: String },
    /// Partial JSON of a tool call's input.
    ToolUseInput { input: String },
    Reasoning { text: String },
    #[serde(other)]
    Other,
}

impl AgentEvent {
    /// Short tag name, used in debug logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BeforeInvocation { .. } => "before_invocation",
            Self::BeforeModelCall { .. } => "before_model_call",
            Self::AfterModelCall { .. } => "after_model_call",
            Self::BeforeTools { .. } => "before_tools",
            Self::AfterTools { .. } => "after_tools",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::AfterInvocation { .. } => "after_invocation",
            Self::Unknown => "unknown",
        }
    }
}
