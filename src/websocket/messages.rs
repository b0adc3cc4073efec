//! WebSocket Message Types
//!
//! Defines the wire vocabulary spoken between clients (live dashboards,
//! embeds) and the rollcall server. Both directions are closed tagged
//! unions: adding a message kind is a compile-time-checked change at every
//! match site, and the literal `type` tags plus field names are part of the
//! protocol contract.

use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a room for real-time updates
    Subscribe {
        /// Room name, e.g. "bill:hr1-119" or "vote:123"
        topic: String,
    },
    /// Unsubscribe from a room
    Unsubscribe {
        /// Room name to drop
        topic: String,
    },
    /// Application-level keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once, immediately after the connection is accepted
    #[serde(rename = "connection:established")]
    ConnectionEstablished { data: ConnectionEstablishedData },
    /// Subscription confirmed
    #[serde(rename = "subscribed")]
    Subscribed { data: TopicAckData },
    /// Unsubscription confirmed
    #[serde(rename = "unsubscribed")]
    Unsubscribed { data: TopicAckData },
    /// Response to a client ping
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
    /// Protocol or topic error
    #[serde(rename = "error")]
    Error { data: ErrorData },
    /// A legislator's position on a vote was recorded or changed
    #[serde(rename = "vote:update")]
    VoteUpdate { data: VoteUpdateData },
    /// Running tally for a vote changed
    #[serde(rename = "tally:update")]
    TallyUpdate { data: TallyUpdateData },
    /// A bill moved to a new status
    #[serde(rename = "bill:status_change")]
    BillStatusChange { data: BillStatusChangeData },
}

/// Error codes carried by `error` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Inbound payload did not parse into a known client message
    InvalidMessage,
    /// Room name failed the grammar, or no such membership existed
    InvalidTopic,
    /// Subscription requires an authenticated identity
    Unauthorized,
    /// Too much subscribe/unsubscribe churn from one connection
    RateLimited,
}

/// Payload of `connection:established`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEstablishedData {
    pub client_id: String,
    pub timestamp: i64,
}

/// Payload of `subscribed` / `unsubscribed`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAckData {
    pub topic: String,
    pub timestamp: i64,
}

/// Payload of `error`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub code: ErrorCode,
    pub message: String,
}

/// A single legislator's recorded position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePosition {
    Yea,
    Nay,
    Present,
    NotVoting,
}

/// Payload of `vote:update`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdateData {
    pub vote_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    pub legislator_id: String,
    pub position: VotePosition,
    pub timestamp: i64,
}

/// Payload of `tally:update`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyUpdateData {
    pub vote_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    pub yeas: u32,
    pub nays: u32,
    pub present: u32,
    pub not_voting: u32,
    pub timestamp: i64,
}

/// Payload of `bill:status_change`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillStatusChangeData {
    pub bill_id: String,
    pub previous_status: String,
    pub new_status: String,
    pub action: String,
    pub timestamp: i64,
}

impl ServerMessage {
    /// Build an `error` message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            data: ErrorData {
                code,
                message: message.into(),
            },
        }
    }

    /// Build a `subscribed` acknowledgement stamped with the current time
    pub fn subscribed(topic: impl Into<String>) -> Self {
        ServerMessage::Subscribed {
            data: TopicAckData {
                topic: topic.into(),
                timestamp: now_millis(),
            },
        }
    }

    /// Build an `unsubscribed` acknowledgement stamped with the current time
    pub fn unsubscribed(topic: impl Into<String>) -> Self {
        ServerMessage::Unsubscribed {
            data: TopicAckData {
                topic: topic.into(),
                timestamp: now_millis(),
            },
        }
    }
}

/// Current wall-clock time as Unix milliseconds, the protocol's timestamp unit
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
