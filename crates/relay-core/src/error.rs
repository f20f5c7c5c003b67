use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed tool arguments, rejected before the tool runs.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure raised by the model provider or the agent loop.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Socket-level failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Wrap a provider-side failure, keeping the full context chain.
    pub fn upstream(err: impl Into<anyhow::Error>) -> Self {
        Self::Upstream(format!("{:#}", err.into()))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
