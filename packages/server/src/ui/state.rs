//! Server state shared by every handler.

use super::connection_tracker::ConnectionTracker;
use crate::{
    config::ConnectionSettings,
    usecase::{
        BroadcastRouter, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        GetHistoryUseCase, GetRoomDetailUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（参加者接続のユースケース）
    pub connect_participant_usecase: ConnectParticipantUseCase,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    pub disconnect_participant_usecase: DisconnectParticipantUseCase,
    /// BroadcastRouter（メッセージ配信のユースケース）
    pub broadcast_router: BroadcastRouter,
    /// GetHistoryUseCase（履歴取得のユースケース）
    pub get_history_usecase: GetHistoryUseCase,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: GetRoomDetailUseCase,
    /// 接続ごとの上限値
    pub connection: ConnectionSettings,
    /// 稼働中の WebSocket 接続（シャットダウン時に停止を待つ）
    pub connections: ConnectionTracker,
}
