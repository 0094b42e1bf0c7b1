//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// One persisted chat message as returned by `GET /messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecordDto {
    pub text: String,
    pub sender: String,
    pub room: String,
    pub time: i64,
}

/// Room detail returned by `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub members: Vec<MemberDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDto {
    pub connection_id: String,
    pub identity: Option<String>,
    /// RFC 3339 (UTC)
    pub connected_at: String,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDto {
    pub error: String,
}
