//! WebSocket subscription for local chat clients
//!
//! Each socket gets its own inbound chat stream. Chats are pushed as JSON
//! text frames; closing the socket cancels the stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::relay::SharedRelay;

/// State for the chat subscription handler
#[derive(Clone)]
pub struct ChatSocketState {
    pub relay: SharedRelay,
}

/// WebSocket upgrade handler for inbound chats
pub async fn ws_chats_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatSocketState>,
) -> impl IntoResponse {
    info!("New chat subscription WebSocket connection");
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state))
}

async fn handle_chat_socket(socket: WebSocket, state: ChatSocketState) {
    let (mut sender, mut receiver) = socket.split();
    let mut chats = state.relay.stream_inbound_chats();

    loop {
        select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Chat subscriber sent close");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring text from chat subscriber: {}", text.as_str());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Chat subscriber WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            chat = chats.recv() => {
                let Some(chat) = chat else {
                    warn!("Inbound chat stream ended");
                    break;
                };

                if let Err(e) = sender.send(Message::Text(chat.encode().into())).await {
                    error!("Failed to push chat to subscriber: {}", e);
                    break;
                }
            }
        }
    }

    chats.cancel();
    info!("Chat subscription WebSocket disconnected");
}
