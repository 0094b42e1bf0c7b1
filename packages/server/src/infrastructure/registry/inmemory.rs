//! InMemory ConnectionRegistry 実装
//!
//! 接続テーブルとルームごとのメンバー集合を 1 つの Mutex で保護します。
//! join / leave / remove / members はすべてこのロックの内側で完結するため、
//! メンバーシップの読み書きは線形化可能です。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc::error::TrySendError};

use crate::domain::{
    ConnectionId, ConnectionRegistry, ConnectionState, DeliveryError, Identity, Mailbox, Member,
    RegistryError, RoomId, Timestamp,
};

struct ConnectionEntry {
    /// `None` once the connection is closed
    mailbox: Option<Mailbox>,
    state: ConnectionState,
    identity: Option<Identity>,
    connected_at: Timestamp,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl RegistryInner {
    /// Drop `connection_id` from the member set of the room it is in.
    fn detach(&mut self, connection_id: &ConnectionId) {
        let Some(entry) = self.connections.get_mut(connection_id) else {
            return;
        };
        if let ConnectionState::Joined(room_id) = &entry.state {
            if let Some(members) = self.rooms.get_mut(room_id) {
                members.remove(connection_id);
                if members.is_empty() {
                    self.rooms.remove(room_id);
                }
            }
            entry.state = ConnectionState::Connected;
        }
    }
}

/// インメモリ ConnectionRegistry 実装
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl InMemoryConnectionRegistry {
    /// 新しい InMemoryConnectionRegistry を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録されている接続数（Closed で残っているものを含む）
    pub async fn count_connections(&self) -> usize {
        self.inner.lock().await.connections.len()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(
        &self,
        mailbox: Mailbox,
        identity: Option<Identity>,
        connected_at: Timestamp,
    ) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        let entry = ConnectionEntry {
            mailbox: Some(mailbox),
            state: ConnectionState::Connected,
            identity,
            connected_at,
        };

        let mut inner = self.inner.lock().await;
        inner.connections.insert(connection_id, entry);
        tracing::debug!("Connection '{}' registered", connection_id);

        connection_id
    }

    async fn join(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;

        match inner.connections.get(connection_id).map(|e| &e.state) {
            None | Some(ConnectionState::Closed) => {
                return Err(RegistryError::InvalidConnection(*connection_id));
            }
            Some(ConnectionState::Joined(current)) if current == &room_id => return Ok(()),
            Some(_) => {}
        }

        inner.detach(connection_id);
        inner
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(*connection_id);
        if let Some(entry) = inner.connections.get_mut(connection_id) {
            entry.state = ConnectionState::Joined(room_id.clone());
        }
        tracing::debug!("Connection '{}' joined room '{}'", connection_id, room_id);

        Ok(())
    }

    async fn leave(&self, connection_id: &ConnectionId) {
        let mut inner = self.inner.lock().await;
        inner.detach(connection_id);
        if let Some(entry) = inner.connections.get_mut(connection_id) {
            if !entry.state.is_closed() {
                tracing::debug!("Connection '{}' closed", connection_id);
            }
            entry.state = ConnectionState::Closed;
            entry.mailbox = None;
        }
    }

    async fn remove(&self, connection_id: &ConnectionId) {
        let mut inner = self.inner.lock().await;
        inner.detach(connection_id);
        if inner.connections.remove(connection_id).is_some() {
            tracing::debug!("Connection '{}' removed from registry", connection_id);
        }
    }

    async fn members(&self, room_id: &RoomId) -> HashSet<ConnectionId> {
        let inner = self.inner.lock().await;
        inner.rooms.get(room_id).cloned().unwrap_or_default()
    }

    async fn member_details(&self, room_id: &RoomId) -> Vec<Member> {
        let inner = self.inner.lock().await;
        let Some(ids) = inner.rooms.get(room_id) else {
            return Vec::new();
        };

        let mut members: Vec<Member> = ids
            .iter()
            .filter_map(|id| {
                inner.connections.get(id).map(|entry| Member {
                    id: *id,
                    identity: entry.identity.clone(),
                    connected_at: entry.connected_at,
                })
            })
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));

        members
    }

    async fn state(&self, connection_id: &ConnectionId) -> ConnectionState {
        let inner = self.inner.lock().await;
        inner
            .connections
            .get(connection_id)
            .map(|entry| entry.state.clone())
            .unwrap_or(ConnectionState::Closed)
    }

    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        payload: &str,
    ) -> Result<(), DeliveryError> {
        let inner = self.inner.lock().await;
        let entry = inner
            .connections
            .get(connection_id)
            .ok_or(DeliveryError::ConnectionNotFound(*connection_id))?;
        let mailbox = entry
            .mailbox
            .as_ref()
            .ok_or(DeliveryError::Closed(*connection_id))?;

        mailbox
            .try_send(payload.to_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::MailboxFull(*connection_id),
                TrySendError::Closed(_) => DeliveryError::Closed(*connection_id),
            })
    }
}
