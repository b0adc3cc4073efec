//! Room Membership Index
//!
//! Sole authority for which connection is subscribed to which room. Keeps
//! two maps as exact inverses: room -> set of clients and client -> set of
//! rooms, both behind a single lock so no reader can observe a half-applied
//! update. Rooms exist only while they have members; empty entries are
//! pruned in the same critical section that empties them.
//!
//! Every operation returns a plain value (bool, set, or vec) and never
//! fails: a malformed or stale call from one client can at most be a no-op,
//! never disturb another connection's memberships.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::RwLock;

use super::connection::ClientId;

/// Room name grammar: `<kind>:<id>`, kind case-insensitive, id lowercase.
/// A whitelist, not a blacklist: anything outside the two known kinds is
/// rejected so arbitrary client strings cannot mint topics.
fn room_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i:(bill|vote)):([a-z0-9-]+)$").expect("room name pattern is valid")
    })
}

/// The two room namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    Bill,
    Vote,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Bill => "bill",
            RoomKind::Vote => "vote",
        }
    }
}

/// A validated, normalized room name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Room {
    kind: RoomKind,
    id: String,
}

impl Room {
    /// Parse and normalize a raw topic string. Returns `None` unless it
    /// matches `^(bill|vote):[a-z0-9-]+$` (kind prefix case-insensitive).
    pub fn parse(topic: &str) -> Option<Self> {
        let caps = room_pattern().captures(topic)?;
        let kind = match caps[1].to_ascii_lowercase().as_str() {
            "bill" => RoomKind::Bill,
            _ => RoomKind::Vote,
        };
        Some(Self {
            kind,
            id: caps[2].to_string(),
        })
    }

    /// The bill room for a bill id
    pub fn bill(id: &str) -> Self {
        Self {
            kind: RoomKind::Bill,
            id: id.to_string(),
        }
    }

    /// The vote room for a vote id
    pub fn vote(id: &str) -> Self {
        Self {
            kind: RoomKind::Vote,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Both sides of the membership index, guarded together
#[derive(Debug, Default)]
struct RoomIndex {
    /// Room name -> subscribed clients
    members: HashMap<String, HashSet<ClientId>>,
    /// Client -> rooms it belongs to
    joined: HashMap<ClientId, HashSet<String>>,
}

/// Snapshot of the index, for diagnostics
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoomStats {
    /// Number of rooms with at least one member
    pub room_count: usize,
    /// Sum of all room membership sizes
    pub total_subscriptions: usize,
    /// Member count per room
    pub rooms: HashMap<String, usize>,
}

/// Manages room membership for all connections
#[derive(Debug, Default)]
pub struct RoomManager {
    index: RwLock<RoomIndex>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a client to a room.
    ///
    /// Returns `true` only for a genuinely new membership. Returns `false`
    /// without touching any state when the room name fails the grammar or
    /// the client is already a member.
    pub async fn subscribe(&self, client: &str, topic: &str) -> bool {
        let Some(room) = Room::parse(topic) else {
            tracing::debug!(client_id = %client, topic = %topic, "Rejected invalid room name");
            return false;
        };
        let room = room.to_string();

        let mut index = self.index.write().await;
        let added = index
            .members
            .entry(room.clone())
            .or_default()
            .insert(client.to_string());
        if !added {
            return false;
        }
        index
            .joined
            .entry(client.to_string())
            .or_default()
            .insert(room.clone());

        tracing::debug!(client_id = %client, room = %room, "Subscribed to room");
        true
    }

    /// Unsubscribe a client from a room.
    ///
    /// Returns `false` when the pair was not a member (unknown room,
    /// unknown client, or a name that never validated). On success both
    /// maps are updated and entries that became empty are removed.
    pub async fn unsubscribe(&self, client: &str, topic: &str) -> bool {
        let Some(room) = Room::parse(topic) else {
            return false;
        };
        let room = room.to_string();

        let mut index = self.index.write().await;
        let Some(clients) = index.members.get_mut(&room) else {
            return false;
        };
        if !clients.remove(client) {
            return false;
        }
        if clients.is_empty() {
            index.members.remove(&room);
        }

        if let Some(rooms) = index.joined.get_mut(client) {
            rooms.remove(&room);
            if rooms.is_empty() {
                index.joined.remove(client);
            }
        }

        tracing::debug!(client_id = %client, room = %room, "Unsubscribed from room");
        true
    }

    /// Remove a client from every room it belongs to, on disconnect.
    ///
    /// Safe to call for a client with no memberships. Returns the rooms the
    /// client was removed from.
    pub async fn remove_client(&self, client: &str) -> Vec<String> {
        let mut index = self.index.write().await;
        let Some(rooms) = index.joined.remove(client) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(clients) = index.members.get_mut(&room) {
                clients.remove(client);
                if clients.is_empty() {
                    index.members.remove(&room);
                }
            }
            removed.push(room);
        }

        tracing::debug!(
            client_id = %client,
            room_count = removed.len(),
            "Removed client from rooms"
        );
        removed
    }

    /// Current subscribers of a room (empty set for unknown rooms)
    pub async fn clients(&self, topic: &str) -> HashSet<ClientId> {
        let index = self.index.read().await;
        index.members.get(topic).cloned().unwrap_or_default()
    }

    /// Rooms a client belongs to (empty set for unknown clients)
    pub async fn client_rooms(&self, client: &str) -> HashSet<String> {
        let index = self.index.read().await;
        index.joined.get(client).cloned().unwrap_or_default()
    }

    /// Snapshot of room count, total subscriptions, and per-room sizes
    pub async fn stats(&self) -> RoomStats {
        let index = self.index.read().await;
        let rooms: HashMap<String, usize> = index
            .members
            .iter()
            .map(|(room, clients)| (room.clone(), clients.len()))
            .collect();
        RoomStats {
            room_count: rooms.len(),
            total_subscriptions: rooms.values().sum(),
            rooms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Both maps must be exact inverses and hold no empty entries
    async fn assert_index_consistent(manager: &RoomManager) {
        let index = manager.index.read().await;
        for (room, clients) in &index.members {
            assert!(!clients.is_empty(), "empty room entry survived: {room}");
            for client in clients {
                assert!(
                    index.joined.get(client).is_some_and(|r| r.contains(room)),
                    "member {client} of {room} missing from reverse index"
                );
            }
        }
        for (client, rooms) in &index.joined {
            assert!(!rooms.is_empty(), "empty client entry survived: {client}");
            for room in rooms {
                assert!(
                    index.members.get(room).is_some_and(|c| c.contains(client)),
                    "reverse entry {client} -> {room} missing from forward index"
                );
            }
        }
    }

    #[test]
    fn test_room_parse_valid() {
        let room = Room::parse("bill:hr1-119").unwrap();
        assert_eq!(room.kind(), RoomKind::Bill);
        assert_eq!(room.to_string(), "bill:hr1-119");

        let room = Room::parse("vote:123").unwrap();
        assert_eq!(room.kind(), RoomKind::Vote);
    }

    #[test]
    fn test_room_parse_kind_case_insensitive() {
        let room = Room::parse("BILL:hr1-119").unwrap();
        assert_eq!(room.to_string(), "bill:hr1-119");
        assert!(Room::parse("Vote:123").is_some());
    }

    #[test]
    fn test_room_parse_rejects_bad_names() {
        assert!(Room::parse("not-a-room").is_none());
        assert!(Room::parse("bill:").is_none());
        assert!(Room::parse("bill:HR1").is_none()); // id is lowercase only
        assert!(Room::parse("committee:judiciary").is_none());
        assert!(Room::parse("vote:1; DROP TABLE").is_none());
        assert!(Room::parse("").is_none());
        assert!(Room::parse("bill:hr1:extra").is_none());
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let manager = RoomManager::new();

        assert!(manager.subscribe("a", "bill:hr1-119").await);
        assert!(!manager.subscribe("a", "bill:hr1-119").await);

        let stats = manager.stats().await;
        assert_eq!(stats.room_count, 1);
        assert_eq!(stats.total_subscriptions, 1);
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_subscribe_invalid_name_creates_nothing() {
        let manager = RoomManager::new();

        assert!(!manager.subscribe("a", "not-a-room").await);

        let stats = manager.stats().await;
        assert_eq!(stats.room_count, 0);
        assert_eq!(stats.total_subscriptions, 0);
        assert!(manager.client_rooms("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_membership() {
        let manager = RoomManager::new();

        // Never subscribed: no error, no side effects
        assert!(!manager.unsubscribe("a", "vote:1").await);
        assert_eq!(manager.stats().await.room_count, 0);

        // Known room, different client
        manager.subscribe("b", "vote:1").await;
        assert!(!manager.unsubscribe("a", "vote:1").await);
        assert_eq!(manager.clients("vote:1").await.len(), 1);
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_prunes_empty_room() {
        let manager = RoomManager::new();

        manager.subscribe("a", "vote:1").await;
        assert!(manager.unsubscribe("a", "vote:1").await);

        let stats = manager.stats().await;
        assert_eq!(stats.room_count, 0);
        assert!(!stats.rooms.contains_key("vote:1"));
        assert!(manager.client_rooms("a").await.is_empty());
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_remove_client_leaves_other_members() {
        let manager = RoomManager::new();

        manager.subscribe("a", "vote:1").await;
        manager.subscribe("b", "vote:1").await;

        let removed = manager.remove_client("a").await;
        assert_eq!(removed, vec!["vote:1".to_string()]);

        let clients = manager.clients("vote:1").await;
        assert_eq!(clients.len(), 1);
        assert!(clients.contains("b"));
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_remove_client_without_memberships() {
        let manager = RoomManager::new();
        assert!(manager.remove_client("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_client_spanning_rooms() {
        let manager = RoomManager::new();

        manager.subscribe("a", "vote:1").await;
        manager.subscribe("a", "bill:hr1-119").await;
        manager.subscribe("b", "bill:hr1-119").await;

        let mut removed = manager.remove_client("a").await;
        removed.sort();
        assert_eq!(removed, vec!["bill:hr1-119".to_string(), "vote:1".to_string()]);

        let stats = manager.stats().await;
        assert_eq!(stats.room_count, 1);
        assert_eq!(stats.rooms.get("bill:hr1-119"), Some(&1));
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_subscribe_normalizes_kind_prefix() {
        let manager = RoomManager::new();

        assert!(manager.subscribe("a", "VOTE:123").await);
        // Same room under its normalized name
        assert!(!manager.subscribe("a", "vote:123").await);
        assert!(manager.clients("vote:123").await.contains("a"));
    }

    #[tokio::test]
    async fn test_stats_totals_across_clients() {
        let manager = RoomManager::new();

        manager.subscribe("a", "vote:1").await;
        manager.subscribe("b", "vote:1").await;
        manager.subscribe("a", "bill:s42").await;

        let stats = manager.stats().await;
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.total_subscriptions, 3);
        assert_eq!(stats.rooms.get("vote:1"), Some(&2));
        assert_eq!(stats.rooms.get("bill:s42"), Some(&1));
        assert_index_consistent(&manager).await;
    }

    #[tokio::test]
    async fn test_lookup_unknown_keys_return_empty() {
        let manager = RoomManager::new();
        assert!(manager.clients("vote:404").await.is_empty());
        assert!(manager.client_rooms("nobody").await.is_empty());
    }
}
