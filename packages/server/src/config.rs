//! Server configuration.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{RoomId, ValueObjectError, value_object::DEFAULT_ROOM_ID};

/// Name of the room every connection is joined to by default
pub const DEFAULT_ROOM: &str = DEFAULT_ROOM_ID;

/// Where chat history is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryBackend {
    /// Process memory; lost on restart
    InMemory,
    /// SQLite database at `database_url` (e.g. `sqlite://hiroba.db`)
    Sqlite { database_url: String },
}

/// Per-connection limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Outbound messages buffered per connection before it is dropped
    pub mailbox_capacity: usize,
    /// Inbound events buffered per connection before reading pauses
    pub inbound_capacity: usize,
    /// Close connections that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

impl ConnectionSettings {
    /// How often the server pings each client.
    ///
    /// Half the idle timeout, so a client that answers pings is never idle
    /// even when it only listens.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.idle_timeout
            .map(|timeout| timeout / 2)
            .filter(|interval| !interval.is_zero())
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            inbound_capacity: 32,
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid room: {0}")]
    InvalidRoom(#[from] ValueObjectError),
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Room joined on connect
    pub room: RoomId,
    pub connection: ConnectionSettings,
    pub history: HistoryBackend,
}

impl ServerConfig {
    /// Build a config, rejecting values the relay cannot run with.
    pub fn new(
        host: String,
        port: u16,
        room: String,
        connection: ConnectionSettings,
        history: HistoryBackend,
    ) -> Result<Self, ConfigError> {
        if connection.mailbox_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("mailbox capacity"));
        }
        if connection.inbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("inbound capacity"));
        }

        Ok(Self {
            host,
            port,
            room: RoomId::new(room)?,
            connection,
            history,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            room: RoomId::default(),
            connection: ConnectionSettings::default(),
            history: HistoryBackend::InMemory,
        }
    }
}
