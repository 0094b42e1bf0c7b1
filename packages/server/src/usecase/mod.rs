//! UseCase layer: the relay's operations, written against the domain traits.

pub mod broadcast_router;
pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod get_history;
pub mod get_room_detail;
pub mod history_writer;

pub use broadcast_router::{BroadcastRouter, DispatchOutcome};
pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, GetRoomDetailError};
pub use get_history::GetHistoryUseCase;
pub use get_room_detail::GetRoomDetailUseCase;
pub use history_writer::HistoryWriter;
