//! Model provider abstraction.
//!
//! Each provider implements the [`LlmProvider`] trait and streams one model
//! response as a sequence of [`ModelStreamEvent`]s.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use relay_core::config::Config;
use relay_core::event::{BlockDelta, BlockStart};
use relay_core::types::{Message, Role, StopReason, ToolSpec};

pub mod anthropic;
pub mod scripted;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use scripted::{ScriptedProvider, ScriptedTurn};

/// A request to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub tools: Vec<ToolSpec>,
    pub system: Option<String>,
}

/// One streamed event from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStreamEvent {
    MessageStart { role: Role },
    ContentBlockStart { index: usize, start: BlockStart },
    ContentBlockDelta { index: usize, delta: BlockDelta },
    ContentBlockStop { index: usize },
    MessageStop { stop_reason: StopReason },
}

pub type ModelStream = Pin<Box<dyn Stream<Item = anyhow::Result<ModelStreamEvent>> + Send>>;

/// The core model provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "anthropic").
    fn id(&self) -> &str;

    /// Stream one model response.
    async fn stream(&self, request: &CompletionRequest) -> anyhow::Result<ModelStream>;
}

/// Build the provider named in `config.model.provider`.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    match config.provider_id().as_str() {
        "anthropic" => {
            let model = config.model.as_ref();
            let api_key = model
                .and_then(|m| m.resolve_api_key())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()))
                .ok_or_else(|| anyhow::anyhow!("no API key configured for provider 'anthropic'"))?;
            let base_url = model.and_then(|m| m.base_url.as_deref());
            Ok(Arc::new(AnthropicProvider::new(api_key, base_url)))
        }
        "scripted" => Ok(Arc::new(ScriptedProvider::echo())),
        other => anyhow::bail!("unknown model provider: {other}"),
    }
}
