//! UseCase: 参加者切断処理
//!
//! クライアント側の切断・通信エラー・アイドルタイムアウトのいずれでも呼ばれます。
//! 既に削除済み（配信失敗で除外された等）の接続に対しても安全に呼べます。

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRegistry};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 参加者切断を実行（冪等）
    pub async fn execute(&self, connection_id: &ConnectionId) {
        self.registry.leave(connection_id).await;
        self.registry.remove(connection_id).await;
    }
}
