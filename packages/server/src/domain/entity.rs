//! Domain entities.

use super::{
    session::Identity,
    value_object::{ConnectionId, RoomId, Timestamp},
};

/// A chat message accepted by the relay. Immutable once created.
///
/// `sender` is whatever label the client supplied; it is not bound to any
/// authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
    pub room: RoomId,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(text: String, sender: String, room: RoomId, timestamp: Timestamp) -> Self {
        Self {
            text,
            sender,
            room,
            timestamp,
        }
    }
}

/// Lifecycle of one connection.
///
/// ```text
/// Connected ──join──▶ Joined(room) ──disconnect──▶ Closed
///     └──────────────disconnect─────────────────────▲
/// ```
///
/// `Closed` is terminal. Unknown connections are reported as `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Joined(RoomId),
    Closed,
}

impl ConnectionState {
    /// The room this connection currently belongs to, if any
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            ConnectionState::Joined(room) => Some(room),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// A room member as shown by the room detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ConnectionId,
    pub identity: Option<Identity>,
    pub connected_at: Timestamp,
}

/// Why a connection went to `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Close frame or end of stream
    ClientClosed,
    TransportError,
    IdleTimeout,
    /// The server is shutting down
    ServerShutdown,
}

/// Events read from a connection, processed one at a time in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Inbound `msg` event
    Message { text: String, sender: String },
    Disconnect(DisconnectReason),
}
