//! WebSocket chat endpoint.
//!
//! Each text frame `{assistant?, message, context?}` is answered with one
//! response envelope. Empty messages are skipped and malformed frames get
//! an error envelope; the connection stays open until the client leaves.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Map;
use tracing::{debug, info, warn};

use crate::types::{ConversationContext, ResponseEnvelope};

use super::handlers::DEFAULT_ASSISTANT;
use super::state::AppState;

#[derive(Debug, Deserialize)]
struct WsRequest {
    #[serde(default)]
    assistant: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    context: Option<ConversationContext>,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let guard = state.connections.connect();
    info!(
        connection = guard.id(),
        active = state.connections.active(),
        "WebSocket connected"
    );

    let (mut sender, mut receiver) = socket.split();

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "WebSocket receive error");
                break;
            }
        };

        let reply = match serde_json::from_str::<WsRequest>(text.as_str()) {
            Ok(req) if req.message.trim().is_empty() => continue,
            Ok(req) => {
                let assistant = req.assistant.as_deref().unwrap_or(DEFAULT_ASSISTANT);
                state
                    .orchestrator
                    .route(assistant, &req.message, req.context)
                    .await
            }
            Err(e) => ResponseEnvelope::failure(
                "system",
                format!("Invalid message format: {}", e),
                vec![],
                Map::new(),
            ),
        };

        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize response");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    let id = guard.id();
    drop(guard);
    info!(
        connection = id,
        active = state.connections.active(),
        "WebSocket disconnected"
    );
}
