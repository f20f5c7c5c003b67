//! Agent facade: turns a prompt into a stream of [`AgentEvent`]s by running a
//! model-call/tool-call loop, plus the adapter that extracts output text from
//! those events.

use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use relay_core::error::Result;
use relay_core::event::AgentEvent;
use relay_core::types::StopReason;

pub mod adapter;
pub mod runtime;

pub use adapter::{process_event, text_fragments};
pub use runtime::{Agent, AgentSettings};

/// Events of one invocation, in emission order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// Outcome of a buffered invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Text of the final model response.
    pub text: String,
    pub stop_reason: Option<StopReason>,
    pub cycles: u32,
    pub tool_calls: usize,
    pub duration_ms: u64,
}

/// Anything that can answer a prompt with agent events.
#[async_trait]
pub trait AgentFacade: Send + Sync {
    /// Start one invocation. The stream is lazy; dropping it cancels the run.
    fn stream(&self, prompt: String) -> EventStream;

    /// Run to completion and return the final response text.
    async fn invoke(&self, prompt: String) -> Result<AgentResult> {
        let start = Instant::now();
        let mut events = self.stream(prompt);
        let mut text = String::new();
        let mut stop_reason = None;
        let mut cycles = 0;
        let mut tool_calls = 0;

        while let Some(event) = events.next().await {
            let event = event?;
            match &event {
                AgentEvent::BeforeModelCall { cycle } => {
                    // Only the last model response counts as the answer.
                    cycles = *cycle;
                    text.clear();
                }
                AgentEvent::BeforeTools { calls } => tool_calls += calls.len(),
                AgentEvent::AfterInvocation { stop_reason: reason } => stop_reason = Some(*reason),
                _ => {}
            }
            if let Some(fragment) = process_event(&event) {
                text.push_str(fragment);
            }
        }

        Ok(AgentResult {
            text,
            stop_reason,
            cycles,
            tool_calls,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
