//! UseCase: 参加者接続処理
//!
//! 接続を Registry に登録し、設定されたチャットルームへ自動的に参加させます。
//! SessionGate で解決した Identity は接続のラベルとして記録するだけで、
//! メッセージの送信者名の検証には使いません。

use std::sync::Arc;

use axum::http::HeaderMap;
use hiroba_shared::time::Clock;

use crate::domain::{
    ConnectionId, ConnectionRegistry, Identity, Mailbox, RoomId, SessionGate, Timestamp,
};

use super::error::ConnectError;

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    session_gate: Arc<dyn SessionGate>,
    clock: Arc<dyn Clock>,
    /// Every connection is joined to this room
    room: RoomId,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        session_gate: Arc<dyn SessionGate>,
        clock: Arc<dyn Clock>,
        room: RoomId,
    ) -> Self {
        Self {
            registry,
            session_gate,
            clock,
            room,
        }
    }

    /// 参加者接続を実行
    ///
    /// # Arguments
    ///
    /// * `mailbox` - クライアントへの送信用チャンネル（Registry が所有する）
    /// * `headers` - アップグレード要求のヘッダー（Identity の解決に使う）
    ///
    /// # Returns
    ///
    /// * `Ok((ConnectionId, Option<Identity>))` - `Joined` になった接続
    /// * `Err(ConnectError)` - ルームへの参加に失敗（接続は破棄済み）
    pub async fn execute(
        &self,
        mailbox: Mailbox,
        headers: &HeaderMap,
    ) -> Result<(ConnectionId, Option<Identity>), ConnectError> {
        let identity = self.session_gate.resolve_identity(headers);
        let connected_at = Timestamp::new(self.clock.now_unix_secs());

        let connection_id = self
            .registry
            .register(mailbox, identity.clone(), connected_at)
            .await;

        if let Err(e) = self.registry.join(&connection_id, self.room.clone()).await {
            self.registry.remove(&connection_id).await;
            return Err(e.into());
        }

        Ok((connection_id, identity))
    }

    /// 自動参加先のルーム
    pub fn room(&self) -> &RoomId {
        &self.room
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionState, session::MockSessionGate},
        infrastructure::registry::InMemoryConnectionRegistry,
    };
    use hiroba_shared::time::FixedClock;
    use tokio::sync::mpsc;

    fn create_usecase(
        gate: MockSessionGate,
    ) -> (ConnectParticipantUseCase, Arc<InMemoryConnectionRegistry>) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let usecase = ConnectParticipantUseCase::new(
            registry.clone(),
            Arc::new(gate),
            Arc::new(FixedClock::new(1000)),
            RoomId::new("chat".to_string()).unwrap(),
        );
        (usecase, registry)
    }

    #[tokio::test]
    async fn test_connect_auto_joins_room() {
        // テスト項目: 接続すると自動的にチャットルームに参加する
        // given (前提条件):
        let mut gate = MockSessionGate::new();
        gate.expect_resolve_identity().returning(|_| None);
        let (usecase, registry) = create_usecase(gate);
        let (tx, _rx) = mpsc::channel(8);

        // when (操作):
        let (id, identity) = usecase.execute(tx, &HeaderMap::new()).await.unwrap();

        // then (期待する結果):
        assert_eq!(identity, None);
        assert_eq!(
            registry.state(&id).await,
            ConnectionState::Joined(usecase.room().clone())
        );
        assert!(registry.members(usecase.room()).await.contains(&id));
    }

    #[tokio::test]
    async fn test_connect_records_identity() {
        // テスト項目: SessionGate が解決した Identity が接続に記録される
        // given (前提条件):
        let mut gate = MockSessionGate::new();
        gate.expect_resolve_identity()
            .times(1)
            .returning(|_| Some(Identity::new("alice")));
        let (usecase, registry) = create_usecase(gate);
        let (tx, _rx) = mpsc::channel(8);

        // when (操作):
        let (id, identity) = usecase.execute(tx, &HeaderMap::new()).await.unwrap();

        // then (期待する結果):
        assert_eq!(identity, Some(Identity::new("alice")));
        let details = registry.member_details(usecase.room()).await;
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].id, id);
        assert_eq!(details[0].identity, Some(Identity::new("alice")));
        assert_eq!(details[0].connected_at, Timestamp::new(1000));
    }
}
