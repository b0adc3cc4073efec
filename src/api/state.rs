//! Application State
//!
//! Shared state accessible by all handlers. One registry/room-manager pair
//! is constructed here at startup and dependency-injected everywhere it is
//! needed, so tests can build isolated instances per case.

use crate::config::Config;
use crate::websocket::{Broadcaster, ConnectionRegistry, RoomManager};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Room membership index
    pub rooms: Arc<RoomManager>,
    /// Connection registry and heartbeat state
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out entry point for domain mutation handlers
    pub broadcaster: Broadcaster,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create application state from configuration
    pub fn new(config: Config) -> Self {
        let rooms = Arc::new(RoomManager::new());
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::clone(&rooms),
            config.websocket.max_connections,
        ));
        let broadcaster = Broadcaster::new(Arc::clone(&rooms), Arc::clone(&registry));

        Self {
            config: Arc::new(config),
            rooms,
            registry,
            broadcaster,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
