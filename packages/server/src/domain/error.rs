//! Domain errors.

use thiserror::Error;

use super::value_object::ConnectionId;

/// Validation failures of value objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("room id must be at most {max} characters")]
    RoomIdTooLong { max: usize },
    #[error("room id must not contain whitespace: '{0}'")]
    RoomIdContainsWhitespace(String),
}

/// Errors of the connection registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The connection is closed or was never registered
    #[error("connection '{0}' is closed")]
    InvalidConnection(ConnectionId),
}

/// Per-member delivery failures during fan-out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The member's outbound mailbox is full (slow consumer)
    #[error("mailbox of connection '{0}' is full")]
    MailboxFull(ConnectionId),
    /// The member's transport has gone away
    #[error("connection '{0}' is closed")]
    Closed(ConnectionId),
    #[error("connection '{0}' not found")]
    ConnectionNotFound(ConnectionId),
}

/// Errors of the history store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    PersistenceUnavailable(String),
}

/// A message could not be turned into its wire form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(pub String);
