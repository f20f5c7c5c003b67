//! Turns agent events into output text.
//!
//! [`process_event`] is the single classification point: it logs lifecycle
//! brackets and tool starts, and extracts the text of text deltas. Both
//! transports and the buffered [`crate::AgentFacade::invoke`] go through it.

use futures::{Stream, StreamExt};
use tracing::info;

use relay_core::error::Result;
use relay_core::event::{AgentEvent, BlockDelta, BlockStart};

/// Classify one event. Returns the fragment text for text deltas and `None`
/// for everything else.
pub fn process_event(event: &AgentEvent) -> Option<&str> {
    match event {
        AgentEvent::BeforeInvocation { invocation_id } => {
            info!(%invocation_id, "Agent invocation started");
        }
        AgentEvent::AfterInvocation { stop_reason } => {
            info!(?stop_reason, "Agent invocation finished");
        }
        AgentEvent::BeforeModelCall { cycle } => {
            info!(cycle, "Model call started");
        }
        AgentEvent::AfterModelCall {
            cycle,
            message,
            stop_reason,
        } => {
            info!(cycle, role = ?message.role, ?stop_reason, "Model call finished");
        }
        AgentEvent::BeforeTools { calls } => {
            let tools: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            info!(?tools, "Tool execution started");
        }
        AgentEvent::AfterTools { results } => {
            let failed = results.iter().filter(|r| r.is_error).count();
            info!(count = results.len(), failed, "Tool execution finished");
        }
        AgentEvent::ContentBlockStart {
            start: BlockStart::ToolUse { tool_use_id, name },
            ..
        } => {
            info!(tool = %name, %tool_use_id, "Using tool");
        }
        AgentEvent::ContentBlockDelta {
            delta: BlockDelta::Text { text },
            ..
        } => return Some(text),
        _ => {}
    }
    None
}

/// Lazily map an event stream to its non-empty text fragments.
///
/// The first upstream error is yielded once and ends the stream. Fragments
/// already yielded stay yielded.
pub fn text_fragments<S>(events: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = Result<AgentEvent>> + Send + 'static,
{
    async_stream::stream! {
        let mut events = Box::pin(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Some(text) = process_event(&event).filter(|t| !t.is_empty()) {
                        yield Ok(text.to_string());
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
