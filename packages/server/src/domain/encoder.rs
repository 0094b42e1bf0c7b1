//! MessageEncoder trait 定義
//!
//! 配信するメッセージをワイヤー形式の文字列に変換するインターフェース。
//! 形式そのもの（JSON のイベント封筒など）は Infrastructure 層が決めます。

use super::{ChatMessage, EncodeError};

/// Message Encoder trait
#[cfg_attr(test, mockall::automock)]
pub trait MessageEncoder: Send + Sync {
    /// Encode `message` into the frame delivered to every room member
    fn encode(&self, message: &ChatMessage) -> Result<String, EncodeError>;
}
