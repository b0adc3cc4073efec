//! # Rollcall
//!
//! Real-time legislative event fan-out. Rollcall keeps WebSocket
//! connections open for browsers watching live floor activity and pushes
//! vote positions, running tallies, and bill status changes to the rooms
//! that care about them.
//!
//! ## Features
//!
//! - **Room-based delivery**: clients subscribe to `bill:{id}` and
//!   `vote:{id}` rooms and receive only those events
//! - **Typed protocol**: a closed vocabulary of JSON messages in both
//!   directions, unknown input answered with a typed error
//! - **Liveness tracking**: a two-phase heartbeat evicts connections that
//!   stop answering pings
//! - **Best-effort fan-out**: a dead connection never blocks delivery to
//!   the rest of a room
//!
//! ## Modules
//!
//! - [`websocket`]: rooms, connections, protocol, and broadcasting
//! - [`api`]: Axum router hosting `/ws` and the monitoring endpoints
//! - [`config`]: TOML file and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollcall::api::{serve, AppState};
//! use rollcall::config::Config;
//! use rollcall::websocket::spawn_heartbeat;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = Config::load_default();
//!     let server = config.server.clone();
//!     let heartbeat = config.websocket.heartbeat_interval();
//!
//!     let state = AppState::new(config);
//!     spawn_heartbeat(Arc::clone(&state.registry), heartbeat);
//!
//!     serve(state, &server).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, AppState};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig, WebsocketConfig};

pub use websocket::{
    spawn_heartbeat, websocket_handler, Broadcaster, ClientId, ClientMessage, ConnectionRegistry,
    ErrorCode, Room, RoomKind, RoomManager, RoomStats, ServerMessage, TallyCounts, VotePosition,
};
