//! Agent runtime loop: streams the model, executes tool calls, emits events.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::config::Config;
use relay_core::error::{RelayError, Result};
use relay_core::event::{AgentEvent, BlockDelta, BlockStart};
use relay_core::types::{ContentBlock, Message, Role, StopReason, ToolCallResult};
use relay_providers::{CompletionRequest, LlmProvider, ModelStreamEvent, provider_from_config};
use relay_tools::ToolRegistry;

use crate::{AgentFacade, EventStream};

/// Per-agent model settings, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub max_cycles: u32,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model_id(),
            system_prompt: config.system_prompt(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            max_cycles: config.max_cycles(),
        }
    }
}

/// The process-wide agent. Cloning is cheap and shares the provider client.
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    settings: Arc<AgentSettings>,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            settings: Arc::new(settings),
        }
    }

    /// Agent with the configured provider and every built-in tool.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = provider_from_config(config)?;
        let tools = ToolRegistry::with_builtin_tools();
        info!(
            provider = provider.id(),
            model = %config.model_id(),
            tools = ?tools.list(),
            "Agent configured"
        );
        Ok(Self::new(provider, tools, AgentSettings::from_config(config)))
    }

    fn request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: self.tools.specs(),
            system: self.settings.system_prompt.clone(),
        }
    }

    fn run(self, prompt: String) -> impl Stream<Item = Result<AgentEvent>> + Send + 'static {
        async_stream::try_stream! {
            let invocation_id = Uuid::new_v4().to_string();
            yield AgentEvent::BeforeInvocation {
                invocation_id: invocation_id.clone(),
            };

            let mut messages = vec![Message::user_text(prompt)];
            let mut cycle = 0;

            loop {
                if cycle >= self.settings.max_cycles {
                    warn!(%invocation_id, max_cycles = self.settings.max_cycles, "Agent cycle limit reached");
                    Err::<(), _>(RelayError::Upstream(format!(
                        "agent exceeded {} model cycles",
                        self.settings.max_cycles
                    )))?;
                }
                cycle += 1;
                debug!(%invocation_id, cycle, "Agent loop iteration");
                yield AgentEvent::BeforeModelCall { cycle };

                let request = self.request(&messages);
                let mut model_stream = self
                    .provider
                    .stream(&request)
                    .await
                    .map_err(RelayError::upstream)?;

                let mut builder = MessageBuilder::default();
                let mut stop_reason = None;

                while let Some(item) = model_stream.next().await {
                    match item.map_err(RelayError::upstream)? {
                        ModelStreamEvent::MessageStart { .. } => {}
                        ModelStreamEvent::ContentBlockStart { index, start } => {
                            builder.start(index, &start);
                            yield AgentEvent::ContentBlockStart { index, start };
                        }
                        ModelStreamEvent::ContentBlockDelta { index, delta } => {
                            builder.delta(index, &delta);
                            yield AgentEvent::ContentBlockDelta { index, delta };
                        }
                        ModelStreamEvent::ContentBlockStop { index } => {
                            yield AgentEvent::ContentBlockStop { index };
                        }
                        ModelStreamEvent::MessageStop { stop_reason: reason } => {
                            stop_reason = Some(reason);
                        }
                    }
                }

                let stop_reason = stop_reason.ok_or_else(|| {
                    warn!(%invocation_id, cycle, "Model stream ended without a stop reason");
                    RelayError::Upstream("model stream ended before a stop reason".into())
                })?;

                let message = builder.finish()?;
                let calls = message.tool_calls();
                yield AgentEvent::AfterModelCall {
                    cycle,
                    message: message.clone(),
                    stop_reason,
                };
                messages.push(message);

                if stop_reason != StopReason::ToolUse || calls.is_empty() {
                    yield AgentEvent::AfterInvocation { stop_reason };
                    break;
                }

                yield AgentEvent::BeforeTools {
                    calls: calls.clone(),
                };

                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    info!(%invocation_id, tool = %call.name, "Executing tool");
                    let output = self.tools.invoke(&call.name, call.input).await;
                    results.push(ToolCallResult {
                        tool_use_id: call.id,
                        name: call.name,
                        content: output.content,
                        is_error: output.is_error,
                    });
                }

                messages.push(Message {
                    role: Role::User,
                    content: results.iter().cloned().map(ContentBlock::from).collect(),
                });
                yield AgentEvent::AfterTools { results };
            }
        }
    }
}

#[async_trait]
impl AgentFacade for Agent {
    fn stream(&self, prompt: String) -> EventStream {
        Box::pin(self.clone().run(prompt))
    }
}

/// A content block being assembled from streamed deltas.
#[derive(Debug)]
enum PartialBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
    Other,
}

/// Assembles the streamed content blocks of one model response.
#[derive(Debug, Default)]
struct MessageBuilder {
    blocks: BTreeMap<usize, PartialBlock>,
}

impl MessageBuilder {
    fn start(&mut self, index: usize, start: &BlockStart) {
        let block = match start {
            BlockStart::Text => PartialBlock::Text(String::new()),
            BlockStart::ToolUse { tool_use_id, name } => PartialBlock::ToolUse {
                id: tool_use_id.clone(),
                name: name.clone(),
                input_json: String::new(),
            },
            BlockStart::Other => PartialBlock::Other,
        };
        self.blocks.insert(index, block);
    }

    fn delta(&mut self, index: usize, delta: &BlockDelta) {
        match (self.blocks.get_mut(&index), delta) {
            (Some(PartialBlock::Text(buf)), BlockDelta::Text { text }) => buf.push_str(text),
            (Some(PartialBlock::ToolUse { input_json, .. }), BlockDelta::ToolUseInput { input }) => {
                input_json.push_str(input)
            }
            // Text without a preceding start still belongs to the answer.
            (None, BlockDelta::Text { text }) => {
                self.blocks.insert(index, PartialBlock::Text(text.clone()));
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<Message> {
        let mut content = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.into_values() {
            match block {
                PartialBlock::Text(text) if !text.is_empty() => {
                    content.push(ContentBlock::Text { text });
                }
                PartialBlock::ToolUse {
                    id,
                    name,
                    input_json,
                } => {
                    let input = if input_json.trim().is_empty() {
                        serde_json::json!({})
                    } else {
                        serde_json::from_str(&input_json).map_err(|e| {
                            RelayError::Upstream(format!("invalid input for tool '{name}': {e}"))
                        })?
                    };
                    content.push(ContentBlock::ToolUse { id, name, input });
                }
                PartialBlock::Text(_) | PartialBlock::Other => {}
            }
        }
        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }
}
