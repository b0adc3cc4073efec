//! Connection Lifecycle
//!
//! Owns every live connection: its identity, optional authenticated user,
//! liveness flag, and the outbound channel the rest of the system sends
//! through. On terminal disconnect the registry hands the connection to
//! [`RoomManager::remove_client`] and drops all local state.
//!
//! The heartbeat sweep runs as an independent fixed-interval task. Each
//! tick evicts connections that never answered the previous tick's ping,
//! then marks every survivor unconfirmed and pings it. A pong restores the
//! liveness flag. This is the only path that removes a connection without
//! an explicit close event; it bounds how long a crashed peer can linger
//! as a phantom subscriber.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::{now_millis, ServerMessage};
use super::room::RoomManager;

/// Unique identifier for a WebSocket connection
pub type ClientId = String;

/// What flows through a connection's outbound channel. This is the minimal
/// capability the rest of the system holds on a socket: enqueue a message,
/// a transport ping, or a close. The actual socket write happens in the
/// connection's writer task, never under a registry lock.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A JSON protocol message
    Message(ServerMessage),
    /// Transport-level ping frame (liveness probe)
    Ping,
    /// Close the connection
    Close,
}

/// Per-connection state held by the registry
#[derive(Debug)]
struct ConnectionHandle {
    sender: mpsc::UnboundedSender<Outbound>,
    /// Authenticated user, absent for anonymous viewers
    user_id: Option<String>,
    /// False while a ping is outstanding; restored by a pong
    alive: bool,
    /// When this connection last subscribed successfully (diagnostic only)
    last_subscribed_at: Option<i64>,
}

/// Errors surfaced when attaching a connection
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Too many connections (limit: {limit})")]
    TooManyConnections { limit: usize },
}

/// Registry of all live connections
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ClientId, ConnectionHandle>>,
    rooms: Arc<RoomManager>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(rooms: Arc<RoomManager>, max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms,
            max_connections,
        }
    }

    /// Register a new connection and assign its client id.
    ///
    /// Fails only when the connection limit is reached; the id is never
    /// reused afterwards.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<Outbound>,
        user_id: Option<String>,
    ) -> Result<ClientId, RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return Err(RegistryError::TooManyConnections {
                limit: self.max_connections,
            });
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                user_id,
                alive: true,
                last_subscribed_at: None,
            },
        );

        tracing::info!(
            client_id = %id,
            total_connections = connections.len(),
            "WebSocket connected"
        );
        Ok(id)
    }

    /// Remove a connection and all of its room memberships.
    ///
    /// Memberships are cleared even when the handle is already gone: a
    /// subscribe buffered behind an eviction can re-create one after
    /// `sweep()` removed the handle, and this is the last cleanup point on
    /// the connection's path. Safe to call twice. Returns the rooms the
    /// client was removed from.
    pub async fn unregister(&self, id: &str) -> Vec<String> {
        let removed = self.connections.write().await.remove(id).is_some();

        let rooms = self.rooms.remove_client(id).await;
        if removed || !rooms.is_empty() {
            tracing::info!(
                client_id = %id,
                room_count = rooms.len(),
                "WebSocket disconnected"
            );
        }
        rooms
    }

    /// Enqueue a message to one connection. Returns false when the
    /// connection is unknown or its channel is closed.
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> bool {
        let connections = self.connections.read().await;
        match connections.get(id) {
            Some(handle) => handle.sender.send(Outbound::Message(message)).is_ok(),
            None => false,
        }
    }

    /// A pong arrived: the peer is confirmed alive until the next tick
    pub async fn mark_alive(&self, id: &str) {
        if let Some(handle) = self.connections.write().await.get_mut(id) {
            handle.alive = true;
        }
    }

    /// Record a successful subscribe time
    pub async fn touch_subscribed(&self, id: &str) {
        if let Some(handle) = self.connections.write().await.get_mut(id) {
            handle.last_subscribed_at = Some(now_millis());
        }
    }

    /// Attach an authenticated user to an existing connection
    pub async fn set_user(&self, id: &str, user_id: String) {
        if let Some(handle) = self.connections.write().await.get_mut(id) {
            handle.user_id = Some(user_id);
        }
    }

    /// The authenticated user on a connection, if any
    pub async fn user_of(&self, id: &str) -> Option<String> {
        let connections = self.connections.read().await;
        connections.get(id).and_then(|h| h.user_id.clone())
    }

    /// When the connection last subscribed, if ever
    pub async fn last_subscribed(&self, id: &str) -> Option<i64> {
        let connections = self.connections.read().await;
        connections.get(id).and_then(|h| h.last_subscribed_at)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// One heartbeat tick: evict connections still unconfirmed from the
    /// previous tick, then mark every survivor unconfirmed and ping it.
    /// Returns the evicted client ids.
    pub async fn sweep(&self) -> Vec<ClientId> {
        let mut dead = Vec::new();
        {
            let mut connections = self.connections.write().await;
            connections.retain(|id, handle| {
                if handle.alive {
                    handle.alive = false;
                    let _ = handle.sender.send(Outbound::Ping);
                    true
                } else {
                    let _ = handle.sender.send(Outbound::Close);
                    dead.push(id.clone());
                    false
                }
            });
        }

        for id in &dead {
            let rooms = self.rooms.remove_client(id).await;
            tracing::warn!(
                client_id = %id,
                room_count = rooms.len(),
                "Evicted unresponsive connection"
            );
        }
        dead
    }
}

/// Run the heartbeat sweep at a fixed interval until aborted
pub fn spawn_heartbeat(registry: Arc<ConnectionRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.sweep().await;
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "Heartbeat evicted dead connections");
            }
        }
    })
}
