//! UseCase: メッセージのブロードキャスト（BroadcastRouter）
//!
//! ## 責務
//!
//! - 送信者が `Joined` であることの確認（それ以外は黙って破棄）
//! - 受信時刻を付与した `ChatMessage` の生成
//! - ルームの現在のメンバー全員（送信者を含む）への配信
//! - 履歴への非同期追記の予約
//!
//! ## 順序保証
//!
//! ルームごとのロックの内側で「メンバー取得 → 全員の Mailbox へ積む →
//! 履歴キューへ積む」を行うため、同じルームのメッセージは受理順に 1 つずつ
//! 処理されます。各メンバーが観測する順序と履歴の追記順は一致します。
//!
//! ## 配信失敗の分離
//!
//! あるメンバーへの配信失敗（Mailbox 満杯・切断済み）はそのメンバーを Registry
//! から削除するだけで、他のメンバーへの配信と `dispatch` 自体は継続します。

use std::{collections::HashMap, sync::Arc};

use hiroba_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ConnectionId, ConnectionRegistry, ConnectionState, MessageEncoder, RoomId,
    Timestamp,
};

use super::history_writer::HistoryWriter;

/// Result of one `dispatch` call. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sender was not joined to a room, or the message could not be
    /// encoded; nothing was delivered or persisted
    Dropped,
    /// The message was fanned out and queued for persistence
    Broadcast {
        message: ChatMessage,
        delivered: usize,
        /// Members whose delivery failed and that were removed
        failed: Vec<ConnectionId>,
    },
}

/// メッセージ配信のユースケース
pub struct BroadcastRouter {
    registry: Arc<dyn ConnectionRegistry>,
    encoder: Arc<dyn MessageEncoder>,
    history_writer: HistoryWriter,
    clock: Arc<dyn Clock>,
    /// Serializes fan-out per room. Only rooms with a dispatch in flight
    /// have an entry.
    room_locks: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl BroadcastRouter {
    /// 新しい BroadcastRouter を作成
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        encoder: Arc<dyn MessageEncoder>,
        history_writer: HistoryWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            encoder,
            history_writer,
            clock,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    /// メッセージを送信者のルームに配信する
    ///
    /// # Arguments
    ///
    /// * `sender_id` - 送信元の接続
    /// * `text` - メッセージ本文
    /// * `sender` - クライアントが名乗る送信者名（検証しない）
    pub async fn dispatch(
        &self,
        sender_id: &ConnectionId,
        text: String,
        sender: String,
    ) -> DispatchOutcome {
        let ConnectionState::Joined(room) = self.registry.state(sender_id).await else {
            tracing::debug!("Dropping message from '{}': not joined to a room", sender_id);
            return DispatchOutcome::Dropped;
        };

        let room_lock = self.room_lock(&room).await;
        let outcome = {
            let _serialized = room_lock.lock().await;
            self.fan_out(sender_id, &room, text, sender).await
        };
        drop(room_lock);
        self.release_room_lock(&room).await;

        outcome
    }

    /// Wait for queued history appends (used on shutdown)
    pub async fn flush_history(&self) {
        self.history_writer.flush().await;
    }

    /// Must be called with the room lock held.
    async fn fan_out(
        &self,
        sender_id: &ConnectionId,
        room: &RoomId,
        text: String,
        sender: String,
    ) -> DispatchOutcome {
        // the sender may have left while we waited for the room
        if self.registry.state(sender_id).await.room() != Some(room) {
            tracing::debug!("Dropping message from '{}': left room '{}'", sender_id, room);
            return DispatchOutcome::Dropped;
        }

        let message = ChatMessage::new(
            text,
            sender,
            room.clone(),
            Timestamp::new(self.clock.now_unix_secs()),
        );
        let payload = match self.encoder.encode(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Dropping message for room '{}': {}", room, e);
                return DispatchOutcome::Dropped;
            }
        };

        let members = self.registry.members(room).await;
        let mut delivered = 0;
        let mut failed = Vec::new();
        for member in members {
            match self.registry.deliver(&member, &payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("Dropping member '{}' of room '{}': {}", member, room, e);
                    self.registry.remove(&member).await;
                    failed.push(member);
                }
            }
        }
        tracing::debug!(
            "Broadcast message from '{}' to {} member(s) of room '{}'",
            message.sender,
            delivered,
            room
        );

        self.history_writer.enqueue(message.clone());

        DispatchOutcome::Broadcast {
            message,
            delivered,
            failed,
        }
    }

    async fn room_lock(&self, room: &RoomId) -> Arc<Mutex<()>> {
        let mut locks = self.room_locks.lock().await;
        locks.entry(room.clone()).or_default().clone()
    }

    /// Drop the room's lock once no dispatch holds or waits on it.
    ///
    /// Handles are only cloned under `room_locks`, so a count of one seen
    /// here means nobody else can reach the lock.
    async fn release_room_lock(&self, room: &RoomId) {
        let mut locks = self.room_locks.lock().await;
        if locks
            .get(room)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(room);
        }
    }

    #[cfg(test)]
    async fn room_lock_count(&self) -> usize {
        self.room_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            EncodeError, HistoryError, HistoryStore, encoder::MockMessageEncoder,
            repository::MockHistoryStore,
        },
        infrastructure::{
            dto::websocket::{OutboundChatMessage, ServerEvent},
            encoder::JsonMessageEncoder,
            history::InMemoryHistoryStore,
            registry::InMemoryConnectionRegistry,
        },
    };
    use hiroba_shared::time::FixedClock;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - dispatch が送信者を含むルーム全員に配信すること
    // - 配信失敗の分離（1 人の失敗が他に影響しない）
    // - 永続化の失敗が配信に影響しないこと
    // - 全メンバーの受信順と履歴の追記順が一致すること
    //
    // 【どのようなシナリオをテストするか】
    // 1. A と B が参加し、A が送信 → 両方が受信し履歴に残る
    // 2. 履歴ストアが落ちている → B は受信できる
    // 3. A が切断済み → B の送信は A に届かず、エラーにもならない
    // 4. Mailbox が満杯のメンバーは削除され、他のメンバーには届く
    // 5. 並行送信でも全員が同じ順序で受信する
    // 6. エンコードに失敗したメッセージは配信も永続化もされない
    // 7. 配信が終わったルームのロックは残らない
    // ========================================

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        registry: Arc<InMemoryConnectionRegistry>,
        router: BroadcastRouter,
    }

    fn create_router(store: Arc<dyn HistoryStore>) -> Fixture {
        create_router_with_encoder(store, Arc::new(JsonMessageEncoder))
    }

    fn create_router_with_encoder(
        store: Arc<dyn HistoryStore>,
        encoder: Arc<dyn MessageEncoder>,
    ) -> Fixture {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let router = BroadcastRouter::new(
            registry.clone(),
            encoder,
            HistoryWriter::spawn(store),
            Arc::new(FixedClock::new(NOW)),
        );
        Fixture { registry, router }
    }

    fn chat_room() -> RoomId {
        RoomId::new("chat".to_string()).unwrap()
    }

    async fn join(
        registry: &InMemoryConnectionRegistry,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = registry.register(tx, None, Timestamp::new(NOW)).await;
        registry.join(&id, chat_room()).await.unwrap();
        (id, rx)
    }

    fn decode(payload: &str) -> OutboundChatMessage {
        match serde_json::from_str::<ServerEvent>(payload).unwrap() {
            ServerEvent::Dist(message) => message,
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_member_including_sender() {
        // テスト項目: A の送信が A 自身を含む全員に届き、履歴の末尾に残る
        // given (前提条件):
        let store = Arc::new(InMemoryHistoryStore::new());
        let fixture = create_router(store.clone());
        let (alice, mut alice_rx) = join(&fixture.registry, 8).await;
        let (_bob, mut bob_rx) = join(&fixture.registry, 8).await;

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&alice, "hi".to_string(), "alice".to_string())
            .await;
        fixture.router.flush_history().await;

        // then (期待する結果):
        let expected = OutboundChatMessage {
            text: "hi".to_string(),
            sender: "alice".to_string(),
            time: NOW,
        };
        assert_eq!(decode(&alice_rx.recv().await.unwrap()), expected);
        assert_eq!(decode(&bob_rx.recv().await.unwrap()), expected);
        assert!(matches!(
            outcome,
            DispatchOutcome::Broadcast { delivered: 2, ref failed, .. } if failed.is_empty()
        ));

        let history = store.list(&chat_room()).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.text, "hi");
        assert_eq!(last.sender, "alice");
        assert_eq!(last.timestamp, Timestamp::new(NOW));
    }

    #[tokio::test]
    async fn test_dispatch_survives_history_outage() {
        // テスト項目: 履歴ストアが使えなくても配信は成功する
        // given (前提条件):
        let mut store = MockHistoryStore::new();
        store
            .expect_append()
            .returning(|_| Err(HistoryError::PersistenceUnavailable("down".to_string())));
        let fixture = create_router(Arc::new(store));
        let (alice, _alice_rx) = join(&fixture.registry, 8).await;
        let (_bob, mut bob_rx) = join(&fixture.registry, 8).await;

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&alice, "still here".to_string(), "alice".to_string())
            .await;
        fixture.router.flush_history().await;

        // then (期待する結果):
        assert!(matches!(
            outcome,
            DispatchOutcome::Broadcast { delivered: 2, .. }
        ));
        assert_eq!(decode(&bob_rx.recv().await.unwrap()).text, "still here");
    }

    #[tokio::test]
    async fn test_dispatch_skips_disconnected_member() {
        // テスト項目: 切断済みの A には届かず、B の送信はエラーにならない
        // given (前提条件):
        let fixture = create_router(Arc::new(InMemoryHistoryStore::new()));
        let (alice, mut alice_rx) = join(&fixture.registry, 8).await;
        let (bob, mut bob_rx) = join(&fixture.registry, 8).await;
        fixture.registry.remove(&alice).await;

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&bob, "anyone?".to_string(), "bob".to_string())
            .await;

        // then (期待する結果):
        assert!(matches!(
            outcome,
            DispatchOutcome::Broadcast { delivered: 1, ref failed, .. } if failed.is_empty()
        ));
        assert_eq!(alice_rx.recv().await, None);
        assert_eq!(decode(&bob_rx.recv().await.unwrap()).text, "anyone?");
    }

    #[tokio::test]
    async fn test_dispatch_from_unjoined_connection_is_dropped() {
        // テスト項目: ルームに参加していない接続からの送信は破棄され、永続化もされない
        // given (前提条件):
        let mut store = MockHistoryStore::new();
        store.expect_append().times(0);
        let fixture = create_router(Arc::new(store));
        let (tx, _rx) = mpsc::channel(8);
        let lurker = fixture
            .registry
            .register(tx, None, Timestamp::new(NOW))
            .await;
        let (_bob, mut bob_rx) = join(&fixture.registry, 8).await;

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&lurker, "psst".to_string(), "eve".to_string())
            .await;
        fixture.router.flush_history().await;

        // then (期待する結果):
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_drops_message_that_cannot_be_encoded() {
        // テスト項目: エンコードに失敗したメッセージは誰にも届かず、永続化もされない
        // given (前提条件):
        let mut store = MockHistoryStore::new();
        store.expect_append().times(0);
        let mut encoder = MockMessageEncoder::new();
        encoder
            .expect_encode()
            .returning(|_| Err(EncodeError("unsupported".to_string())));
        let fixture = create_router_with_encoder(Arc::new(store), Arc::new(encoder));
        let (alice, mut alice_rx) = join(&fixture.registry, 8).await;

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&alice, "hi".to_string(), "alice".to_string())
            .await;
        fixture.router.flush_history().await;

        // then (期待する結果):
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert!(alice_rx.try_recv().is_err());
        assert_eq!(
            fixture.registry.state(&alice).await,
            ConnectionState::Joined(chat_room())
        );
    }

    #[tokio::test]
    async fn test_room_lock_is_released_after_dispatch() {
        // テスト項目: 配信が終わるとルームのロックはマップから取り除かれる
        // given (前提条件):
        let fixture = create_router(Arc::new(InMemoryHistoryStore::new()));
        let (alice, _alice_rx) = join(&fixture.registry, 8).await;
        let (tx, _rx) = mpsc::channel(8);
        let roamer = fixture
            .registry
            .register(tx, None, Timestamp::new(NOW))
            .await;
        let other_room = RoomId::new("random".to_string()).unwrap();
        fixture.registry.join(&roamer, other_room).await.unwrap();

        // when (操作):
        fixture
            .router
            .dispatch(&alice, "one".to_string(), "alice".to_string())
            .await;
        fixture
            .router
            .dispatch(&roamer, "two".to_string(), "bob".to_string())
            .await;

        // then (期待する結果):
        assert_eq!(fixture.router.room_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_dispatch_isolates_slow_member() {
        // テスト項目: Mailbox が満杯のメンバーは削除され、他のメンバーには届く
        // given (前提条件):
        let fixture = create_router(Arc::new(InMemoryHistoryStore::new()));
        let (alice, _alice_rx) = join(&fixture.registry, 8).await;
        let (slow, _slow_rx) = join(&fixture.registry, 1).await;
        let (_bob, mut bob_rx) = join(&fixture.registry, 8).await;
        fixture.registry.deliver(&slow, "backlog").await.unwrap();

        // when (操作):
        let outcome = fixture
            .router
            .dispatch(&alice, "hello".to_string(), "alice".to_string())
            .await;

        // then (期待する結果):
        match outcome {
            DispatchOutcome::Broadcast {
                delivered, failed, ..
            } => {
                assert_eq!(delivered, 2);
                assert_eq!(failed, vec![slow]);
            }
            DispatchOutcome::Dropped => panic!("message should have been broadcast"),
        }
        assert_eq!(decode(&bob_rx.recv().await.unwrap()).text, "hello");
        assert_eq!(fixture.registry.state(&slow).await, ConnectionState::Closed);
        assert!(!fixture.registry.members(&chat_room()).await.contains(&slow));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_preserves_one_order_everywhere() {
        // テスト項目: 並行送信でも全メンバーが同じ順序で受信し、履歴も同じ順序になる
        // given (前提条件):
        let store = Arc::new(InMemoryHistoryStore::new());
        let fixture = create_router(store.clone());
        let router = Arc::new(fixture.router);
        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (id, rx) = join(&fixture.registry, 128).await;
            senders.push(id);
            receivers.push(rx);
        }

        // when (操作): 3 人が 20 件ずつ並行に送信
        let mut handles = Vec::new();
        for (n, sender) in senders.iter().copied().enumerate() {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..20 {
                    router
                        .dispatch(&sender, format!("{}-{}", n, i), format!("user{}", n))
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        router.flush_history().await;

        // then (期待する結果):
        let mut observed = Vec::new();
        for rx in receivers.iter_mut() {
            let mut texts = Vec::new();
            while let Ok(payload) = rx.try_recv() {
                texts.push(decode(&payload).text);
            }
            assert_eq!(texts.len(), 60);
            observed.push(texts);
        }
        assert_eq!(observed[0], observed[1]);
        assert_eq!(observed[1], observed[2]);

        let history: Vec<String> = store
            .list(&chat_room())
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(history, observed[0]);
        assert_eq!(router.room_lock_count().await, 0);
    }
}
