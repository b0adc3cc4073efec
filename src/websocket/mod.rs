//! WebSocket Real-Time Fan-Out
//!
//! Room-based publish/subscribe over persistent WebSocket connections.
//!
//! ## Architecture
//!
//! - **RoomManager**: bidirectional membership index between connections
//!   and `<kind>:<id>` rooms
//! - **ConnectionRegistry**: connection identity, liveness, and the
//!   heartbeat sweep that evicts unresponsive peers
//! - **Broadcaster**: turns committed domain changes into room deliveries
//! - **Handler**: WebSocket upgrade and the protocol boundary
//! - **Messages**: the closed client/server message vocabulary
//!
//! ## Usage
//!
//! Clients connect to `/ws` and subscribe to rooms:
//! - `bill:{id}` - status changes and vote activity for a bill
//! - `vote:{id}` - positions and tallies for a roll-call vote
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8090/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topic: 'vote:123'}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log('Received:', msg);
//! };
//! ```

mod broadcast;
mod connection;
mod handler;
mod messages;
mod room;

pub use broadcast::{Broadcaster, TallyCounts};
pub use connection::{spawn_heartbeat, ClientId, ConnectionRegistry, Outbound, RegistryError};
pub use handler::websocket_handler;
pub use messages::{
    BillStatusChangeData, ClientMessage, ErrorCode, ServerMessage, TallyUpdateData, VotePosition,
    VoteUpdateData,
};
pub use room::{Room, RoomKind, RoomManager, RoomStats};
