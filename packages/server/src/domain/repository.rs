//! HistoryStore trait 定義
//!
//! ルームごとのメッセージ履歴（追記のみ）へのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{ChatMessage, HistoryError, RoomId};

/// History Store trait
///
/// `list` returns messages of a room in the order they were appended.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// メッセージを履歴に追記
    async fn append(&self, message: ChatMessage) -> Result<(), HistoryError>;

    /// ルームの履歴を追記順に全件取得
    async fn list(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, HistoryError>;
}
