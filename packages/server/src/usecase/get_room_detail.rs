//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, Member, RoomId};

use super::error::GetRoomDetailError;

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl GetRoomDetailUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// ルームの現在のメンバーを取得
    ///
    /// 誰もいないルームは存在しないものとして扱う
    pub async fn execute(&self, room_id: &RoomId) -> Result<Vec<Member>, GetRoomDetailError> {
        let members = self.registry.member_details(room_id).await;
        if members.is_empty() {
            return Err(GetRoomDetailError::RoomNotFound);
        }
        Ok(members)
    }
}
