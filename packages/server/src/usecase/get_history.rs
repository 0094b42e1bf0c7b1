//! UseCase: 履歴取得
//!
//! HistoryStore を直接読みます。ストアのエラーはそのまま呼び出し元へ返します。

use std::sync::Arc;

use crate::domain::{ChatMessage, HistoryError, HistoryStore, RoomId};

/// 履歴取得のユースケース
pub struct GetHistoryUseCase {
    store: Arc<dyn HistoryStore>,
}

impl GetHistoryUseCase {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// ルームの履歴を追記順に取得
    pub async fn execute(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, HistoryError> {
        self.store.list(room_id).await
    }
}
