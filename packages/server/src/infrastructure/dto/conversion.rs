//! Conversion logic between DTOs and domain entities.

use hiroba_shared::time::timestamp_to_rfc3339;

use crate::domain::{ChatMessage, Member};
use crate::infrastructure::dto::{http, websocket};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<ChatMessage> for websocket::OutboundChatMessage {
    fn from(model: ChatMessage) -> Self {
        Self {
            text: model.text,
            sender: model.sender,
            time: model.timestamp.value(),
        }
    }
}

impl From<ChatMessage> for http::HistoryRecordDto {
    fn from(model: ChatMessage) -> Self {
        Self {
            text: model.text,
            sender: model.sender,
            room: model.room.into_string(),
            time: model.timestamp.value(),
        }
    }
}

impl From<Member> for http::MemberDto {
    fn from(model: Member) -> Self {
        Self {
            connection_id: model.id.to_string(),
            identity: model.identity.map(|i| i.as_str().to_string()),
            connected_at: timestamp_to_rfc3339(model.connected_at.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, Identity, RoomId, Timestamp};

    fn chat_message() -> ChatMessage {
        ChatMessage::new(
            "hi".to_string(),
            "alice".to_string(),
            RoomId::new("chat".to_string()).unwrap(),
            Timestamp::new(1_672_531_200),
        )
    }

    #[test]
    fn test_domain_chat_message_to_outbound() {
        // テスト項目: ChatMessage が配信用 DTO に変換される（room は含まない）
        // given (前提条件):
        let model = chat_message();

        // when (操作):
        let dto: websocket::OutboundChatMessage = model.into();

        // then (期待する結果):
        assert_eq!(dto.text, "hi");
        assert_eq!(dto.sender, "alice");
        assert_eq!(dto.time, 1_672_531_200);
    }

    #[test]
    fn test_domain_chat_message_to_history_record() {
        // テスト項目: ChatMessage が履歴 DTO に変換される（room を含む）
        // given (前提条件):
        let model = chat_message();

        // when (操作):
        let dto: http::HistoryRecordDto = model.into();

        // then (期待する結果):
        assert_eq!(
            dto,
            http::HistoryRecordDto {
                text: "hi".to_string(),
                sender: "alice".to_string(),
                room: "chat".to_string(),
                time: 1_672_531_200,
            }
        );
    }

    #[test]
    fn test_domain_member_to_dto() {
        // テスト項目: Member が DTO に変換され、接続時刻は RFC 3339 になる
        // given (前提条件):
        let id = ConnectionId::generate();
        let model = Member {
            id,
            identity: Some(Identity::new("bob")),
            connected_at: Timestamp::new(1_672_531_200),
        };

        // when (操作):
        let dto: http::MemberDto = model.into();

        // then (期待する結果):
        assert_eq!(dto.connection_id, id.to_string());
        assert_eq!(dto.identity.as_deref(), Some("bob"));
        assert_eq!(dto.connected_at, "2023-01-01T00:00:00+00:00");
    }
}
