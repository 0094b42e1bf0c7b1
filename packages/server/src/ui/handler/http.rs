//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    domain::{HistoryError, RoomId},
    infrastructure::dto::http::{ErrorDto, HistoryRecordDto, MemberDto, RoomDetailDto},
    ui::state::AppState,
    usecase::GetRoomDetailError,
};

type ApiError = (StatusCode, Json<ErrorDto>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorDto {
            error: message.to_string(),
        }),
    )
}

/// Query parameters for `GET /messages`
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Defaults to the room connections are joined to
    pub room: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get the persisted history of a room, oldest first
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecordDto>>, ApiError> {
    let room = match query.room {
        Some(room) => RoomId::new(room).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
        None => state.connect_participant_usecase.room().clone(),
    };

    match state.get_history_usecase.execute(&room).await {
        // Domain Model から DTO への変換
        Ok(messages) => Ok(Json(
            messages.into_iter().map(HistoryRecordDto::from).collect(),
        )),
        Err(e @ HistoryError::PersistenceUnavailable(_)) => {
            tracing::error!("Failed to read history of room '{}': {}", room, e);
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e))
        }
    }
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, ApiError> {
    let room = RoomId::new(room_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    match state.get_room_detail_usecase.execute(&room).await {
        Ok(members) => Ok(Json(RoomDetailDto {
            id: room.into_string(),
            members: members.into_iter().map(MemberDto::from).collect(),
        })),
        Err(e @ GetRoomDetailError::RoomNotFound) => Err(api_error(StatusCode::NOT_FOUND, e)),
    }
}
