//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default config file, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "agent-relay.json5";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Providers the host knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["anthropic", "scripted"];

/// Top-level agent-relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(default)]
    pub response_mode: ResponseMode,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// How `/invocations` delivers the agent's answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Await the whole run and return one JSON string.
    Buffered,
    /// Return a `text/event-stream` of text fragments.
    #[default]
    Streaming,
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buffered" => Ok(Self::Buffered),
            "streaming" => Ok(Self::Streaming),
            other => Err(format!("unknown response mode: {other}")),
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider id: "anthropic" (default) or "scripted".
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_provider() -> String {
    "anthropic".into()
}

impl ModelConfig {
    /// Resolve the API key: check `api_key` first, then the `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Maximum model calls per invocation (default: 10).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Per-crate overrides (e.g. "relay_runtime=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            format: default_log_format(),
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns with their environment values (missing -> empty).
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file. A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse JSON5 text, substituting `${ENV_VAR}` references first.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let substituted = substitute_env_vars(raw)?;
        json5::from_str(&substituted).map_err(|e| crate::error::RelayError::Config(e.to_string()))
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.server
            .as_ref()
            .map(|s| s.response_mode)
            .unwrap_or_default()
    }

    pub fn provider_id(&self) -> String {
        self.model
            .as_ref()
            .map(|m| m.provider.clone())
            .unwrap_or_else(default_provider)
    }

    pub fn model_id(&self) -> String {
        self.model
            .as_ref()
            .and_then(|m| m.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn max_tokens(&self) -> u32 {
        self.model.as_ref().and_then(|m| m.max_tokens).unwrap_or(4096)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.model.as_ref().and_then(|m| m.temperature)
    }

    pub fn max_cycles(&self) -> u32 {
        self.agent.as_ref().and_then(|a| a.max_cycles).unwrap_or(10)
    }

    pub fn system_prompt(&self) -> Option<String> {
        self.agent.as_ref().and_then(|a| a.system_prompt.clone())
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// This config with every defaulted section and field filled in.
    pub fn effective(&self) -> Config {
        let model = self.model.clone().unwrap_or_else(|| ModelConfig {
            provider: default_provider(),
            model: None,
            api_key: None,
            api_key_env: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
        });
        Config {
            server: Some(ServerConfig {
                port: self.port(),
                bind: Some(self.bind()),
                response_mode: self.response_mode(),
            }),
            model: Some(ModelConfig {
                model: Some(self.model_id()),
                max_tokens: Some(self.max_tokens()),
                ..model
            }),
            agent: Some(AgentConfig {
                system_prompt: self.system_prompt(),
                max_cycles: Some(self.max_cycles()),
            }),
            logging: Some(self.logging()),
        }
    }

    /// Get a config value by dotted path (e.g. "server.port"). Unset values
    /// resolve to their defaults.
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self.effective()).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let provider = self.provider_id();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            errors.push(format!("Unknown model provider '{provider}'"));
        }

        if provider == "anthropic"
            && self
                .model
                .as_ref()
                .and_then(|m| m.resolve_api_key())
                .is_none()
            && std::env::var("ANTHROPIC_API_KEY").map_or(true, |k| k.is_empty())
        {
            warnings.push("Provider 'anthropic' has no API key configured".to_string());
        }

        if self.port() == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.max_cycles() == 0 {
            errors.push("agent.max_cycles must be at least 1".to_string());
        }

        let logging = self.logging();
        if !matches!(logging.format.as_str(), "plain" | "json") {
            errors.push(format!("Unknown log format '{}'", logging.format));
        }
        if !matches!(logging.output.as_str(), "stderr" | "stdout") {
            errors.push(format!("Unknown log output '{}'", logging.output));
        }

        (warnings, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.bind(), "0.0.0.0");
        assert_eq!(config.response_mode(), ResponseMode::Streaming);
        assert_eq!(config.provider_id(), "anthropic");
        assert_eq!(config.max_tokens(), 4096);
        assert_eq!(config.max_cycles(), 10);
        assert!(config.logging().enabled);
    }

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_RELAY_KEY", "sk-test-123") };
        let result = substitute_env_vars(r#"{"key": "${TEST_RELAY_KEY}", "other": "plain"}"#)
            .unwrap();
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_RELAY_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let result = substitute_env_vars(r#"{"key": "${NONEXISTENT_VAR_RELAY_TEST}"}"#).unwrap();
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_parse_json5() {
        let config = Config::parse(
            r#"{
                // comments are allowed
                server: { port: 9000, response_mode: "buffered" },
                model: { provider: "scripted" },
                agent: { max_cycles: 3 },
                logging: { enabled: true, level: "debug" },
            }"#,
        )
        .unwrap();
        assert_eq!(config.port(), 9000);
        assert_eq!(config.response_mode(), ResponseMode::Buffered);
        assert_eq!(config.provider_id(), "scripted");
        assert_eq!(config.max_cycles(), 3);
        assert_eq!(config.logging().level.as_deref(), Some("debug"));
        assert_eq!(config.logging().format, "plain");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json5")).unwrap();
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json5");
        std::fs::write(&path, "{ server: { port: 8181 } }").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.port(), 8181);
    }

    #[test]
    fn test_load_invalid_is_config_error() {
        let err = Config::parse("{ server: ").unwrap_err();
        assert!(matches!(err, crate::error::RelayError::Config(_)));
    }

    #[test]
    fn test_model_resolve_api_key() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_RELAY_API_KEY", "from-env") };
        let mut model = ModelConfig {
            provider: "anthropic".into(),
            model: None,
            api_key: None,
            api_key_env: Some("TEST_RELAY_API_KEY".into()),
            base_url: None,
            max_tokens: None,
            temperature: None,
        };
        assert_eq!(model.resolve_api_key(), Some("from-env".into()));

        model.api_key = Some("direct-key".into());
        assert_eq!(model.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_RELAY_API_KEY") };
    }

    #[test]
    fn test_validate_unknown_provider_errors() {
        let config = Config::parse(r#"{ model: { provider: "bogus" } }"#).unwrap();
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("bogus")),
            "Expected an error naming the provider, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_port_zero_errors() {
        let config = Config::parse(r#"{ server: { port: 0 } }"#).unwrap();
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("port")));
    }

    #[test]
    fn test_validate_scripted_is_clean() {
        let config = Config::parse(r#"{ model: { provider: "scripted" } }"#).unwrap();
        let (warnings, errors) = config.validate();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_get_path() {
        let config = Config::parse(r#"{ server: { port: 9001 } }"#).unwrap();
        assert_eq!(config.get_path("server.port"), Some(serde_json::json!(9001)));
        assert_eq!(config.get_path("server.missing"), None);
    }

    #[test]
    fn test_get_path_resolves_defaults() {
        let config = Config::default();
        assert_eq!(config.get_path("server.port"), Some(serde_json::json!(8080)));
        assert_eq!(config.get_path("server.bind"), Some(serde_json::json!("0.0.0.0")));
        assert_eq!(config.get_path("server.response_mode"), Some(serde_json::json!("streaming")));
        assert_eq!(config.get_path("model.provider"), Some(serde_json::json!("anthropic")));
        assert_eq!(config.get_path("agent.max_cycles"), Some(serde_json::json!(10)));
        assert_eq!(config.get_path("logging.format"), Some(serde_json::json!("plain")));
        assert_eq!(config.get_path("agent.system_prompt"), None);

        let config = Config::parse(r#"{ model: { provider: "scripted", max_tokens: 64 } }"#).unwrap();
        assert_eq!(config.get_path("model.provider"), Some(serde_json::json!("scripted")));
        assert_eq!(config.get_path("model.max_tokens"), Some(serde_json::json!(64)));
        assert_eq!(config.get_path("server.port"), Some(serde_json::json!(8080)));
    }

    #[test]
    fn test_response_mode_from_str() {
        assert_eq!("buffered".parse::<ResponseMode>(), Ok(ResponseMode::Buffered));
        assert!("chunked".parse::<ResponseMode>().is_err());
    }
}
