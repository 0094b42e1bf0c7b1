//! WebSocket event envelopes.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Clients send `msg` events; the relay fans out `dist` events.

use serde::{Deserialize, Serialize};

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "msg")]
    Msg(InboundChatPayload),
}

/// Payload of an inbound `msg` event.
///
/// Clients also send a `time` field; it is ignored in favour of the relay's
/// receipt time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundChatPayload {
    pub text: String,
    pub sender: String,
}

/// Events the relay sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "dist")]
    Dist(OutboundChatMessage),
}

/// Payload of an outbound `dist` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundChatMessage {
    pub text: String,
    pub sender: String,
    pub time: i64,
}
