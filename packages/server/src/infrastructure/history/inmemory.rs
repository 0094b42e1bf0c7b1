//! InMemory HistoryStore 実装
//!
//! ルームごとに Vec へ追記します。プロセス終了で履歴は失われます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, HistoryError, HistoryStore, RoomId};

/// インメモリ HistoryStore 実装
#[derive(Default)]
pub struct InMemoryHistoryStore {
    rooms: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, message: ChatMessage) -> Result<(), HistoryError> {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(message.room.clone()).or_default().push(message);
        Ok(())
    }

    async fn list(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, HistoryError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(room_id).cloned().unwrap_or_default())
    }
}
