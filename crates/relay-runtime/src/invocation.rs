//! `POST /invocations`: one prompt in, the agent's answer out.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use relay_agent::text_fragments;
use relay_core::config::ResponseMode;
use relay_core::error::RelayError;

use crate::session::SessionId;
use crate::state::RuntimeState;

/// Error response for a buffered invocation: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (code, body).into_response()
    }
}

/// Decode a request body. Anything that is not JSON is taken as a raw string.
pub fn parse_payload(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Prompt text for a payload: strings verbatim, anything else as compact JSON.
pub fn normalize_prompt(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn payload_kind(payload: &Value) -> &'static str {
    match payload {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub async fn invocations_handler(
    State(state): State<Arc<RuntimeState>>,
    SessionId(session_id): SessionId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = parse_payload(&body);
    let prompt = normalize_prompt(&payload);
    info!(%session_id, payload_type = payload_kind(&payload), %prompt, "Invocation received");

    let busy = state.begin_work();

    match state.config.response_mode() {
        ResponseMode::Buffered => {
            let result = state.agent.invoke(prompt).await.inspect_err(|e| {
                error!(%session_id, %e, "Invocation failed");
            })?;
            info!(
                %session_id,
                cycles = result.cycles,
                tool_calls = result.tool_calls,
                duration_ms = result.duration_ms,
                "Invocation complete"
            );
            drop(busy);
            Ok(Json(result.text).into_response())
        }
        ResponseMode::Streaming => {
            let events = text_fragments(state.agent.stream(prompt)).map(move |item| {
                // Released when the response body is dropped.
                let _busy = &busy;
                match item {
                    Ok(text) => Event::default()
                        .json_data(text)
                        .map_err(|e| RelayError::Transport(e.to_string())),
                    Err(e) => {
                        warn!(%session_id, %e, "Aborting streaming invocation");
                        Err(e)
                    }
                }
            });
            Ok(Sse::new(events).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use relay_agent::{Agent, AgentSettings};
    use relay_core::config::Config;
    use relay_core::session::SESSION_HEADER;
    use relay_providers::{ScriptedProvider, ScriptedTurn};
    use relay_tools::ToolRegistry;
    use tower::ServiceExt;

    use crate::server::build_router;

    fn router(mode: &str, provider: ScriptedProvider) -> axum::Router {
        let config = Config::parse(&format!("{{ server: {{ response_mode: \"{mode}\" }} }}")).unwrap();
        let agent = Agent::new(
            Arc::new(provider),
            ToolRegistry::with_builtin_tools(),
            AgentSettings::from_config(&config),
        );
        build_router(Arc::new(RuntimeState::new(Arc::new(config), Arc::new(agent))))
    }

    fn calculator_turns() -> ScriptedProvider {
        ScriptedProvider::new([
            ScriptedTurn::tool_use("t1", "calculator", json!({"operation": "add", "a": 5, "b": 3})),
            ScriptedTurn::Text(vec!["5 + 3".into(), " = 8".into()]),
        ])
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/invocations")
            .header(SESSION_HEADER, "test-session-1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(normalize_prompt(&json!("Calculate 5 + 3")), "Calculate 5 + 3");
        assert_eq!(
            normalize_prompt(&json!({"prompt": "Calculate 5 + 3"})),
            r#"{"prompt":"Calculate 5 + 3"}"#
        );
        assert_eq!(normalize_prompt(&json!(42)), "42");
        assert_eq!(normalize_prompt(&json!(null)), "null");
        assert_eq!(normalize_prompt(&json!("")), "");
    }

    #[test]
    fn test_parse_payload_falls_back_to_raw_text() {
        assert_eq!(parse_payload(br#""hi""#), json!("hi"));
        assert_eq!(parse_payload(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_payload(b"plain words"), json!("plain words"));
        assert_eq!(parse_payload(b""), json!(""));
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (RelayError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (RelayError::Upstream("down".into()), StatusCode::BAD_GATEWAY),
            (RelayError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_buffered_returns_json_string() {
        let app = router("buffered", calculator_turns());
        let response = app.oneshot(post(r#""Calculate 5 + 3""#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(text, json!("5 + 3 = 8"));
    }

    #[tokio::test]
    async fn test_buffered_upstream_failure_is_502() {
        let app = router(
            "buffered",
            ScriptedProvider::new([ScriptedTurn::Fail("model unavailable".into())]),
        );
        let response = app.oneshot(post("hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_streaming_emits_sse_fragments() {
        let app = router("streaming", calculator_turns());
        let response = app.oneshot(post(r#""Calculate 5 + 3""#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(body, "data: \"5 + 3\"\n\ndata: \" = 8\"\n\n");
    }

    #[tokio::test]
    async fn test_streaming_body_holds_busy_guard() {
        let config = Config::parse(r#"{ server: { response_mode: "streaming" } }"#).unwrap();
        let agent = Agent::new(
            Arc::new(calculator_turns()),
            ToolRegistry::with_builtin_tools(),
            AgentSettings::from_config(&config),
        );
        let state = Arc::new(RuntimeState::new(Arc::new(config), Arc::new(agent)));
        let app = build_router(state.clone());

        let response = app.oneshot(post("Calculate 5 + 3")).await.unwrap();
        assert_eq!(state.in_flight(), 1);
        assert_eq!(state.ping().status, crate::state::HealthStatus::HealthyBusy);

        to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(state.in_flight(), 0);
        assert_eq!(state.ping().status, crate::state::HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_buffered_releases_busy_guard_before_responding() {
        let config = Config::parse(r#"{ server: { response_mode: "buffered" } }"#).unwrap();
        let agent = Agent::new(
            Arc::new(ScriptedProvider::echo()),
            ToolRegistry::new(),
            AgentSettings::from_config(&config),
        );
        let state = Arc::new(RuntimeState::new(Arc::new(config), Arc::new(agent)));

        let response = build_router(state.clone()).oneshot(post("hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_streaming_failure_aborts_body() {
        let app = router(
            "streaming",
            ScriptedProvider::new([ScriptedTurn::FailMidStream {
                chunks: vec!["partial".into()],
                message: "connection reset".into(),
            }]),
        );
        let response = app.oneshot(post("hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn test_object_payload_is_sent_as_json_text() {
        let provider = Arc::new(ScriptedProvider::echo());
        let config = Config::parse(r#"{ server: { response_mode: "buffered" } }"#).unwrap();
        let agent = Agent::new(provider.clone(), ToolRegistry::new(), AgentSettings::from_config(&config));
        let app = build_router(Arc::new(RuntimeState::new(Arc::new(config), Arc::new(agent))));

        let response = app.oneshot(post(r#"{"prompt": "hi"}"#)).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!(r#"{"prompt":"hi"}"#));

        let requests = provider.requests().await;
        assert_eq!(requests[0].messages[0].text(), r#"{"prompt":"hi"}"#);
    }
}
