//! ConnectionRegistry trait 定義
//!
//! ライブ接続とルームのメンバーシップを管理するインターフェース。
//! 接続の送信チャンネル（`Mailbox`）は Registry が排他的に所有します。

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    ConnectionId, ConnectionState, DeliveryError, Identity, Member, RegistryError, RoomId,
    Timestamp,
};

/// Bounded outbound queue of one connection.
///
/// The receiving half is drained by the connection's writer task. Dropping
/// every sender closes the connection's outbound side.
pub type Mailbox = mpsc::Sender<String>;

/// Connection Registry trait
///
/// All operations are linearizable: a membership change is visible to every
/// `members` call that starts after it returns.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 新しい接続を `Connected` 状態で登録
    async fn register(
        &self,
        mailbox: Mailbox,
        identity: Option<Identity>,
        connected_at: Timestamp,
    ) -> ConnectionId;

    /// 接続をルームに参加させる（既に別ルームにいる場合はそこから抜ける）
    async fn join(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RegistryError>;

    /// ルームから抜けて `Closed` にする（冪等）
    async fn leave(&self, connection_id: &ConnectionId);

    /// ルームから抜けて `Closed` にし、接続自体を破棄する（冪等）
    async fn remove(&self, connection_id: &ConnectionId);

    /// ルームの現在のメンバーのスナップショット
    async fn members(&self, room_id: &RoomId) -> HashSet<ConnectionId>;

    /// ルームの現在のメンバーの詳細（connection id 順）
    async fn member_details(&self, room_id: &RoomId) -> Vec<Member>;

    /// 接続の現在の状態（未知の接続は `Closed`）
    async fn state(&self, connection_id: &ConnectionId) -> ConnectionState;

    /// 接続の Mailbox にメッセージを積む（ブロックしない）
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        payload: &str,
    ) -> Result<(), DeliveryError>;
}
