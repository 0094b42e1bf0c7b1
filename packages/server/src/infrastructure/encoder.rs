//! MessageEncoder の実装
//!
//! 配信メッセージを `{"event":"dist","data":{...}}` の JSON にします。

use crate::{
    domain::{ChatMessage, EncodeError, MessageEncoder},
    infrastructure::dto::websocket::ServerEvent,
};

/// JSON `dist` event encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMessageEncoder;

impl MessageEncoder for JsonMessageEncoder {
    fn encode(&self, message: &ChatMessage) -> Result<String, EncodeError> {
        // Domain Model から DTO への変換
        let event = ServerEvent::Dist(message.clone().into());
        serde_json::to_string(&event).map_err(|e| EncodeError(e.to_string()))
    }
}
