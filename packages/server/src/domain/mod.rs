//! Domain layer: value objects, entities, errors and the interfaces the
//! relay depends on.
//!
//! ## 依存性の逆転（DIP）
//!
//! - `ConnectionRegistry` / `HistoryStore` / `SessionGate` / `MessageEncoder` は
//!   ドメイン層が定義する
//! - 具体的な実装は Infrastructure 層が提供する
//! - UseCase 層は trait にのみ依存する

pub mod encoder;
pub mod entity;
pub mod error;
pub mod registry;
pub mod repository;
pub mod session;
pub mod value_object;

pub use encoder::MessageEncoder;
pub use entity::{ChatMessage, ConnectionEvent, ConnectionState, DisconnectReason, Member};
pub use error::{DeliveryError, EncodeError, HistoryError, RegistryError, ValueObjectError};
pub use registry::{ConnectionRegistry, Mailbox};
pub use repository::HistoryStore;
pub use session::{Identity, SessionGate};
pub use value_object::{ConnectionId, RoomId, Timestamp};
