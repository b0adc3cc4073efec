//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and the protocol boundary for each
//! connection: a writer task drains the outbound channel to the socket,
//! and the reader loop parses inbound frames into [`ClientMessage`]s.
//! Payloads that do not parse into the closed message set are rejected
//! here with `INVALID_MESSAGE` and never reach the room index.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection::{ConnectionRegistry, Outbound};
use super::messages::{
    now_millis, ClientMessage, ConnectionEstablishedData, ErrorCode, ServerMessage,
};
use super::room::{Room, RoomManager};
use crate::api::AppState;

/// WebSocket upgrade handler, the entry point for `/ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    let rooms = Arc::clone(&state.rooms);
    ws.on_upgrade(move |socket| handle_socket(socket, registry, rooms))
}

/// Drive an established WebSocket connection until either side closes
async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Channel the rest of the system sends through; the writer task below
    // is the only place that touches the socket sink.
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let client_id = match registry.register(tx, None).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Refused WebSocket connection");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    registry
        .send_to(
            &client_id,
            ServerMessage::ConnectionEstablished {
                data: ConnectionEstablishedData {
                    client_id: client_id.clone(),
                    timestamp: now_millis(),
                },
            },
        )
        .await;

    let conn_id_for_send = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(msg) => match serde_json::to_string(&msg) {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            tracing::debug!(
                                client_id = %conn_id_for_send,
                                "WebSocket send failed, closing connection"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize message");
                    }
                },
                Outbound::Ping => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let registry_for_recv = Arc::clone(&registry);
    let rooms_for_recv = Arc::clone(&rooms);
    let conn_id_for_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&registry_for_recv, &rooms_for_recv, &conn_id_for_recv, msg)
                        .await
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        client_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // Disconnect is unconditional: memberships go in the same tick
    registry.unregister(&client_id).await;
}

/// Handle one received WebSocket frame.
///
/// Returns false when the connection should be closed.
async fn handle_ws_message(
    registry: &Arc<ConnectionRegistry>,
    rooms: &Arc<RoomManager>,
    client_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(registry, rooms, client_id, client_msg).await;
                }
                Err(e) => {
                    tracing::debug!(
                        client_id = %client_id,
                        error = %e,
                        "Invalid client message"
                    );
                    let error = ServerMessage::error(
                        ErrorCode::InvalidMessage,
                        format!("Invalid message format: {e}"),
                    );
                    let _ = registry.send_to(client_id, error).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error =
                ServerMessage::error(ErrorCode::InvalidMessage, "Binary messages not supported");
            let _ = registry.send_to(client_id, error).await;
            true
        }
        Message::Ping(_) => {
            // Axum answers transport pings automatically
            true
        }
        Message::Pong(_) => {
            registry.mark_alive(client_id).await;
            true
        }
        Message::Close(_) => {
            tracing::debug!(client_id = %client_id, "Client requested close");
            false
        }
    }
}

/// Dispatch a parsed client message
async fn handle_client_message(
    registry: &Arc<ConnectionRegistry>,
    rooms: &Arc<RoomManager>,
    client_id: &str,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Subscribe { topic } => {
            let Some(room) = Room::parse(&topic) else {
                let error = ServerMessage::error(
                    ErrorCode::InvalidTopic,
                    format!("Room name must match <bill|vote>:<id>, got {topic:?}"),
                );
                let _ = registry.send_to(client_id, error).await;
                return;
            };
            let topic = room.to_string();

            // A repeat subscribe is a no-op in the index but the requested
            // state holds either way, so it is still acknowledged.
            if rooms.subscribe(client_id, &topic).await {
                registry.touch_subscribed(client_id).await;
            }
            let _ = registry
                .send_to(client_id, ServerMessage::subscribed(topic))
                .await;
        }
        ClientMessage::Unsubscribe { topic } => {
            let topic = Room::parse(&topic).map_or(topic, |room| room.to_string());
            if rooms.unsubscribe(client_id, &topic).await {
                let _ = registry
                    .send_to(client_id, ServerMessage::unsubscribed(topic))
                    .await;
            } else {
                let error = ServerMessage::error(
                    ErrorCode::InvalidTopic,
                    format!("No subscription for {topic:?}"),
                );
                let _ = registry.send_to(client_id, error).await;
            }
        }
        ClientMessage::Ping => {
            let _ = registry
                .send_to(
                    client_id,
                    ServerMessage::Pong {
                        timestamp: now_millis(),
                    },
                )
                .await;
        }
    }
}
