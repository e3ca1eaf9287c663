//! WebSocket fan-out: every connected UI client receives every relay event.
//!
//! Slow consumers that fall behind the broadcast buffer are disconnected and
//! expected to reconnect; no per-client queueing or replay.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::routes::AppState;

pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEvent {
    pub event: String,
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub payload: Value,
}

impl RelayEvent {
    pub fn new(event: &str, payload: Value) -> Self {
        Self {
            event: event.to_string(),
            id: Uuid::new_v4(),
            at: Utc::now(),
            payload,
        }
    }
}

/// Serialize and publish an event to all subscribers. Returns the receiver
/// count; zero subscribers is not an error.
pub fn publish(events: &broadcast::Sender<String>, event: &RelayEvent) -> usize {
    match serde_json::to_string(event) {
        Ok(text) => events.send(text).unwrap_or(0),
        Err(e) => {
            warn!("Failed to serialize relay event: {}", e);
            0
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    debug!("WebSocket subscriber connected");

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(text) => {
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("WebSocket subscriber lagged, dropped {} events", skipped);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if socket.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Subscribers are listen-only; inbound text is ignored.
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    debug!("WebSocket subscriber disconnected");
}
