//! Test clients for a running runtime host.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::debug;

use relay_core::session::SESSION_HEADER;

pub const DEFAULT_INVOKE_PROMPT: &str = "Calculate 5 plus 3 using the calculator tool";
pub const DEFAULT_WS_MESSAGE: &str = "Calculate 5 + 3";

/// `test-session-<unix millis>-<random digits>`.
pub fn test_session_id() -> String {
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    format!(
        "test-session-{}-{suffix}",
        chrono::Utc::now().timestamp_millis()
    )
}

/// Append `path` unless the URL already ends with it.
fn with_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(path) {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

pub fn invocations_url(base: &str) -> String {
    with_path(base, "/invocations")
}

/// WebSocket URL for a host; `http(s)://` becomes `ws(s)://`.
pub fn ws_url(base: &str) -> String {
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    with_path(&base, "/ws")
}

/// POST one prompt to `/invocations` and print the answer.
pub async fn invoke(base: &str, prompt: &str, session: Option<String>) -> anyhow::Result<()> {
    let url = invocations_url(base);
    let session = session.unwrap_or_else(test_session_id);

    println!("Session ID: {session}");
    println!("Input: {prompt}");

    debug!(%url, "Posting invocation");
    let response = reqwest::Client::new()
        .post(&url)
        .header(SESSION_HEADER, &session)
        .header("accept", "text/event-stream")
        .json(&prompt)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        anyhow::bail!("invocation failed with {status}: {body}");
    }

    println!("Response: {body}");
    Ok(())
}

/// Send one message over `/ws`, print the first frame, and close.
pub async fn ws(base: &str, message: &str) -> anyhow::Result<()> {
    let url = ws_url(base);
    let mut request = url.as_str().into_client_request()?;
    let session = format!("test-session-{}", chrono::Utc::now().timestamp_millis());
    request
        .headers_mut()
        .insert(SESSION_HEADER, session.parse()?);

    let (mut socket, _) = connect_async(request).await?;
    println!("WebSocket connected");

    socket.send(Message::Text(message.into())).await?;

    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => {
                println!("Response: {}", text.as_str());
                break;
            }
            Message::Binary(data) => {
                println!("Response: {}", String::from_utf8_lossy(&data));
                break;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    socket.close(None).await.ok();
    println!("WebSocket connection closed");
    Ok(())
}
