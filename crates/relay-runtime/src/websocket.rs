//! WebSocket connection lifecycle: each inbound frame is one prompt.
//!
//! Frames are handled one at a time. The read loop does not pull the next
//! frame until every fragment of the current answer has been written.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, error, info, warn};

use relay_agent::text_fragments;
use relay_core::error::{RelayError, Result};

use crate::session::SessionId;
use crate::state::RuntimeState;

type WsSender = SplitSink<WebSocket, Message>;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RuntimeState>>,
    SessionId(session_id): SessionId,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket, session_id))
}

/// Text of the error frame sent when a message fails.
pub fn error_frame(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Handle one upgraded connection until the client leaves.
pub async fn handle_ws_connection(state: Arc<RuntimeState>, ws: WebSocket, session_id: String) {
    info!(%session_id, "WebSocket connection opened");

    let (mut ws_tx, mut ws_rx) = ws.split();

    while let Some(msg_result) = ws_rx.next().await {
        let prompt = match msg_result {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%session_id, %e, "Binary frame is not valid UTF-8");
                    let frame = error_frame("Binary message is not valid UTF-8");
                    if send(&mut ws_tx, frame).await.is_err() {
                        break;
                    }
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                debug!(%session_id, ?frame, "Client requested close");
                break;
            }
            // Axum answers pings itself
            Ok(_) => continue,
            Err(e) => {
                error!(%session_id, %e, "WebSocket error");
                break;
            }
        };

        if let Err(e) = process_message(&state, &mut ws_tx, &session_id, prompt).await {
            warn!(%session_id, %e, "Dropping WebSocket connection");
            break;
        }
    }

    info!(%session_id, "WebSocket connection closed");
}

/// Stream one answer to the socket. Agent failures become an error frame;
/// only a failed socket write is returned as an error.
async fn process_message(
    state: &Arc<RuntimeState>,
    ws_tx: &mut WsSender,
    session_id: &str,
    prompt: String,
) -> Result<()> {
    info!(%session_id, %prompt, "WebSocket message received");
    let _busy = state.begin_work();

    let mut fragments = Box::pin(text_fragments(state.agent.stream(prompt)));
    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => send(ws_tx, text).await?,
            Err(e) => {
                error!(%session_id, %e, "WebSocket message failed");
                send(ws_tx, error_frame(&e.to_string())).await?;
            }
        }
    }
    debug!(%session_id, "WebSocket message complete");
    Ok(())
}

async fn send(ws_tx: &mut WsSender, text: String) -> Result<()> {
    ws_tx
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| RelayError::Transport(e.to_string()))
}
