use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::relay;
use crate::session::SessionId;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection.
///
/// The session id lives exactly as long as this function. Exchanges run as
/// detached tasks and hand their frames back through `outbound_tx`.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session = SessionId::new();
    tracing::info!(session_id = %session, "New frontend connection established");

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    loop {
        tokio::select! {
            Some(msg) = outbound_rx.recv() => {
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            tracing::error!(session_id = %session, "Failed to send response");
                            break;
                        }
                    }
                    Err(e) => tracing::error!(session_id = %session, "Failed to encode response: {}", e),
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(session_id = %session, "Received message: {}", text.as_str());
                        let _exchange = relay::dispatch_text(text.as_str(), &session, &state, &outbound_tx);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let _exchange = relay::dispatch_bytes(&bytes, &session, &state, &outbound_tx);
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!(session_id = %session, "Close frame received");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(session_id = %session, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(session_id = %session, "Frontend connection closed");
}
