//! Domain Event Broadcasting
//!
//! Translates committed domain mutations (a recorded vote, an updated
//! tally, a bill status change) into room deliveries. The broadcaster owns
//! no domain state: callers invoke it strictly after persisting a change,
//! and each event is built, fanned out, and discarded.
//!
//! Delivery is best-effort. The subscriber set is snapshotted per room, a
//! failed enqueue to one connection is logged and skipped, and nothing is
//! retried.

use std::sync::Arc;

use super::connection::ConnectionRegistry;
use super::messages::{
    now_millis, BillStatusChangeData, ServerMessage, TallyUpdateData, VotePosition, VoteUpdateData,
};
use super::room::{Room, RoomManager};

/// Vote counts for a tally update
#[derive(Debug, Clone, Copy, Default)]
pub struct TallyCounts {
    pub yeas: u32,
    pub nays: u32,
    pub present: u32,
    pub not_voting: u32,
}

/// Fans domain events out to subscribed connections
#[derive(Debug, Clone)]
pub struct Broadcaster {
    rooms: Arc<RoomManager>,
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(rooms: Arc<RoomManager>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, registry }
    }

    /// A legislator's position was recorded. Delivered to the vote room,
    /// and to the bill room when the vote is tied to a bill.
    pub async fn emit_vote_update(
        &self,
        vote_id: &str,
        bill_id: Option<&str>,
        legislator_id: &str,
        position: VotePosition,
    ) {
        let message = ServerMessage::VoteUpdate {
            data: VoteUpdateData {
                vote_id: vote_id.to_string(),
                bill_id: bill_id.map(String::from),
                legislator_id: legislator_id.to_string(),
                position,
                timestamp: now_millis(),
            },
        };
        self.deliver_vote_scoped(vote_id, bill_id, message).await;
    }

    /// The running tally for a vote changed. Same dual-room delivery as
    /// vote updates.
    pub async fn emit_tally_update(&self, vote_id: &str, bill_id: Option<&str>, tally: TallyCounts) {
        let message = ServerMessage::TallyUpdate {
            data: TallyUpdateData {
                vote_id: vote_id.to_string(),
                bill_id: bill_id.map(String::from),
                yeas: tally.yeas,
                nays: tally.nays,
                present: tally.present,
                not_voting: tally.not_voting,
                timestamp: now_millis(),
            },
        };
        self.deliver_vote_scoped(vote_id, bill_id, message).await;
    }

    /// A bill moved to a new status. Bill room only.
    pub async fn emit_bill_status_change(
        &self,
        bill_id: &str,
        previous_status: &str,
        new_status: &str,
        action: &str,
    ) {
        let message = ServerMessage::BillStatusChange {
            data: BillStatusChangeData {
                bill_id: bill_id.to_string(),
                previous_status: previous_status.to_string(),
                new_status: new_status.to_string(),
                action: action.to_string(),
                timestamp: now_millis(),
            },
        };
        self.fan_out(&Room::bill(bill_id), message).await;
    }

    /// A recorded position together with the tally that reflects it.
    /// The vote update is delivered before the tally update for every
    /// recipient, so consumers deriving tally state from the latest
    /// position always see the position first.
    pub async fn emit_vote_with_tally(
        &self,
        vote_id: &str,
        bill_id: Option<&str>,
        legislator_id: &str,
        position: VotePosition,
        tally: TallyCounts,
    ) {
        self.emit_vote_update(vote_id, bill_id, legislator_id, position)
            .await;
        self.emit_tally_update(vote_id, bill_id, tally).await;
    }

    /// Deliver to `vote:{vote_id}`, plus `bill:{bill_id}` when present
    async fn deliver_vote_scoped(
        &self,
        vote_id: &str,
        bill_id: Option<&str>,
        message: ServerMessage,
    ) {
        self.fan_out(&Room::vote(vote_id), message.clone()).await;
        if let Some(bill_id) = bill_id {
            self.fan_out(&Room::bill(bill_id), message).await;
        }
    }

    /// Send one message to every current subscriber of a room
    async fn fan_out(&self, room: &Room, message: ServerMessage) {
        let topic = room.to_string();
        let clients = self.rooms.clients(&topic).await;
        if clients.is_empty() {
            tracing::trace!(room = %topic, "No subscribers for event");
            return;
        }

        let mut sent = 0;
        let mut failed = 0;
        for client in clients {
            if self.registry.send_to(&client, message.clone()).await {
                sent += 1;
            } else {
                failed += 1;
                tracing::warn!(
                    client_id = %client,
                    room = %topic,
                    "Failed to send event to connection (likely closed)"
                );
            }
        }

        tracing::debug!(
            room = %topic,
            recipients = sent,
            failed,
            "Broadcast event to room"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Outbound;
    use tokio::sync::mpsc;

    struct Fixture {
        rooms: Arc<RoomManager>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Broadcaster,
    }

    fn fixture() -> Fixture {
        let rooms = Arc::new(RoomManager::new());
        let registry = Arc::new(ConnectionRegistry::new(Arc::clone(&rooms), 1000));
        let broadcaster = Broadcaster::new(Arc::clone(&rooms), Arc::clone(&registry));
        Fixture {
            rooms,
            registry,
            broadcaster,
        }
    }

    async fn connect(f: &Fixture) -> (String, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = f.registry.register(tx, None).await.unwrap();
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            if let Outbound::Message(msg) = outbound {
                messages.push(msg);
            }
        }
        messages
    }

    #[tokio::test]
    async fn test_vote_with_tally_orders_events_per_recipient() {
        let f = fixture();
        let (vote_watcher, mut vote_rx) = connect(&f).await;
        let (bill_watcher, mut bill_rx) = connect(&f).await;

        f.rooms.subscribe(&vote_watcher, "vote:1").await;
        f.rooms.subscribe(&bill_watcher, "bill:hr1-119").await;

        f.broadcaster
            .emit_vote_with_tally(
                "1",
                Some("hr1-119"),
                "L1",
                VotePosition::Yea,
                TallyCounts {
                    yeas: 10,
                    nays: 5,
                    present: 0,
                    not_voting: 1,
                },
            )
            .await;

        for rx in [&mut vote_rx, &mut bill_rx] {
            let messages = drain(rx);
            assert_eq!(messages.len(), 2);
            match &messages[0] {
                ServerMessage::VoteUpdate { data } => {
                    assert_eq!(data.vote_id, "1");
                    assert_eq!(data.bill_id.as_deref(), Some("hr1-119"));
                    assert_eq!(data.position, VotePosition::Yea);
                }
                other => panic!("Expected vote update first, got {other:?}"),
            }
            match &messages[1] {
                ServerMessage::TallyUpdate { data } => {
                    assert_eq!(data.yeas, 10);
                    assert_eq!(data.not_voting, 1);
                }
                other => panic!("Expected tally update second, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_vote_update_without_bill_stays_in_vote_room() {
        let f = fixture();
        let (vote_watcher, mut vote_rx) = connect(&f).await;
        let (bill_watcher, mut bill_rx) = connect(&f).await;

        f.rooms.subscribe(&vote_watcher, "vote:9").await;
        f.rooms.subscribe(&bill_watcher, "bill:hr1-119").await;

        f.broadcaster
            .emit_vote_update("9", None, "L2", VotePosition::Nay)
            .await;

        assert_eq!(drain(&mut vote_rx).len(), 1);
        assert!(drain(&mut bill_rx).is_empty());
    }

    #[tokio::test]
    async fn test_bill_status_change_is_bill_scoped() {
        let f = fixture();
        let (vote_watcher, mut vote_rx) = connect(&f).await;
        let (bill_watcher, mut bill_rx) = connect(&f).await;

        f.rooms.subscribe(&vote_watcher, "vote:1").await;
        f.rooms.subscribe(&bill_watcher, "bill:hr1-119").await;

        f.broadcaster
            .emit_bill_status_change("hr1-119", "committee", "floor", "reported")
            .await;

        assert!(drain(&mut vote_rx).is_empty());
        let messages = drain(&mut bill_rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::BillStatusChange { data } => {
                assert_eq!(data.previous_status, "committee");
                assert_eq!(data.new_status, "floor");
            }
            other => panic!("Expected bill status change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_send_does_not_abort_fan_out() {
        let f = fixture();
        let (gone, gone_rx) = connect(&f).await;
        let (live, mut live_rx) = connect(&f).await;

        f.rooms.subscribe(&gone, "vote:1").await;
        f.rooms.subscribe(&live, "vote:1").await;

        // Receiver dropped: sends to this connection fail
        drop(gone_rx);

        f.broadcaster
            .emit_tally_update("1", None, TallyCounts::default())
            .await;

        assert_eq!(drain(&mut live_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_emit_with_no_subscribers() {
        let f = fixture();
        // Should not panic or create rooms
        f.broadcaster
            .emit_vote_update("1", Some("hr1-119"), "L1", VotePosition::Present)
            .await;
        assert_eq!(f.rooms.stats().await.room_count, 0);
    }

    #[tokio::test]
    async fn test_subscriber_of_both_rooms_gets_both_copies() {
        // A client watching the vote and its bill receives the event once
        // per room it subscribes to; deduplication is a client concern.
        let f = fixture();
        let (watcher, mut rx) = connect(&f).await;

        f.rooms.subscribe(&watcher, "vote:1").await;
        f.rooms.subscribe(&watcher, "bill:hr1-119").await;

        f.broadcaster
            .emit_vote_update("1", Some("hr1-119"), "L1", VotePosition::Yea)
            .await;

        assert_eq!(drain(&mut rx).len(), 2);
    }
}
