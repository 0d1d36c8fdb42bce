//! WebSocket cable endpoint.
//!
//! A client opens `/cable` and sends a subscribe command carrying its
//! signed stream token. The token decides acceptance: a verified token
//! subscribes the socket to exactly the stream it was signed for, anything
//! else is rejected. One socket carries one stream subscription.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use livecast_core::StreamVerifier;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::CableState;

/// First frame a client sends after connecting.
#[derive(Debug, Deserialize)]
pub struct SubscribeCommand {
    pub command: String,
    pub signed_stream_name: String,
}

/// Control frames sent back to the client.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    ConfirmSubscription,
    RejectSubscription,
}

/// Decide a subscription attempt: the verified stream name, or `None` to
/// reject. Never guesses a stream for a bad token.
pub fn accept_subscription(verifier: &StreamVerifier, command: &SubscribeCommand) -> Option<String> {
    if command.command != "subscribe" {
        return None;
    }
    verifier.verified(&command.signed_stream_name)
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<CableState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<CableState>) {
    let (mut sender, mut receiver) = socket.split();

    // The subscription handshake: first text frame must be a valid
    // subscribe command with a verifiable token.
    let stream_name = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                let accepted = serde_json::from_str::<SubscribeCommand>(&text)
                    .ok()
                    .and_then(|cmd| accept_subscription(state.verifier(), &cmd));
                match accepted {
                    Some(stream_name) => break stream_name,
                    None => {
                        debug!("subscription rejected");
                        let frame = serde_json::to_string(&ControlFrame::RejectSubscription)
                            .expect("control frame serializes");
                        let _ = sender.send(Message::Text(frame.into())).await;
                        return;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    };

    let mut rx = state.subscribe(&stream_name);
    info!(stream = %stream_name, subscribers = state.subscriber_count(&stream_name), "cable client subscribed");

    let frame = serde_json::to_string(&ControlFrame::ConfirmSubscription)
        .expect("control frame serializes");
    if sender.send(Message::Text(frame.into())).await.is_err() {
        return;
    }

    // Forward stream payloads to this client.
    let send_task = tokio::spawn(async move {
        while let Ok(payload) = rx.recv().await {
            let json = match serde_json::to_string(&payload) {
                Ok(json) => json,
                Err(_) => continue,
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("cable send failed, client disconnected");
                break;
            }
        }
    });

    // Drain the client side until it closes.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("cable client sent close frame");
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(stream = %stream_name, "cable client disconnected");
}
