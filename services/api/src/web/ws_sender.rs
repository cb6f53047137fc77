//! services/api/src/web/ws_sender.rs
//!
//! A small shared handle around the WebSocket send half, so the connection
//! loop and the background workers can all write frames.

use crate::web::protocol::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Cloneable sender for one WebSocket connection.
#[derive(Clone)]
pub struct WsSender {
    inner: Arc<Mutex<SplitSink<WebSocket, Message>>>,
}

impl WsSender {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Serializes and sends a protocol message. Returns `false` if the client
    /// is gone; callers treat that as "stop talking", not as an error.
    pub async fn send_json(&self, msg: &ServerMessage) -> bool {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize server message: {}", e);
                return false;
            }
        };
        if self
            .inner
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .is_err()
        {
            warn!("Failed to send message to client; connection likely closed.");
            return false;
        }
        true
    }

    /// Sends a raw binary frame (synthesized speech audio).
    pub async fn send_binary(&self, data: Vec<u8>) -> bool {
        self.inner
            .lock()
            .await
            .send(Message::Binary(data.into()))
            .await
            .is_ok()
    }
}
