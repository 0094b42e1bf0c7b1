//! WebSocket connection handlers.
//!
//! Each connection runs three pieces:
//!
//! - reader: socket frames → `ConnectionEvent` → inbound queue (bounded)
//! - event loop: inbound queue → `BroadcastRouter::dispatch`, one event at a time
//! - writer: mailbox (bounded, owned by the registry) → socket, plus a ping
//!   every half idle timeout
//!
//! Any inbound frame resets the idle timer, pongs included, so a client that
//! only listens stays connected as long as its transport answers pings.
//!
//! The connection is `Joined` before the upgrade completes and goes to
//! `Closed` when the reader reports a disconnect, the writer stops or the
//! server shuts down. The event loop only stops between two events, so a
//! dispatch is never cut short.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};

use crate::{
    domain::{ConnectionEvent, ConnectionId, DisconnectReason},
    infrastructure::dto::websocket::ClientEvent,
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    // Create the bounded mailbox for this client; the registry owns the sender
    let (tx, rx) = mpsc::channel(state.connection.mailbox_capacity);

    let (connection_id, identity) = match state
        .connect_participant_usecase
        .execute(tx, &headers)
        .await
    {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    tracing::info!(
        "Connection '{}' joined room '{}' (identity: {})",
        connection_id,
        state.connect_participant_usecase.room(),
        identity.as_ref().map_or("anonymous", |i| i.as_str())
    );

    let failed_state = state.clone();
    Ok(ws
        .on_failed_upgrade(move |e| {
            tracing::warn!("WebSocket upgrade for '{}' failed: {}", connection_id, e);
            tokio::spawn(async move {
                failed_state
                    .disconnect_participant_usecase
                    .execute(&connection_id)
                    .await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, state, connection_id, rx)))
}

/// Spawns a task that drains the mailbox into the WebSocket sender and
/// pings the client every `heartbeat`.
///
/// Ends when the mailbox is closed (the registry dropped the connection) or
/// the socket write fails.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    heartbeat: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut heartbeat = heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    if sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                _ = next_tick(&mut heartbeat) => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    })
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Spawns a task that turns socket frames into `ConnectionEvent`s.
///
/// The last event sent is always `ConnectionEvent::Disconnect`.
fn reader_loop(
    mut receiver: SplitStream<WebSocket>,
    inbound: mpsc::Sender<ConnectionEvent>,
    connection_id: ConnectionId,
    idle_timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
                    Ok(next) => next,
                    Err(_) => break DisconnectReason::IdleTimeout,
                },
                None => receiver.next().await,
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_id, e);
                    break DisconnectReason::TransportError;
                }
                None => break DisconnectReason::ClientClosed,
            };

            match msg {
                Message::Text(text) => {
                    if let Some(event) = parse_client_event(&connection_id, text.as_str()) {
                        // Waiting here pauses reading when the event loop falls behind
                        if inbound.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping from '{}'", connection_id);
                    // Pong is sent automatically by the WebSocket implementation
                }
                Message::Close(_) => break DisconnectReason::ClientClosed,
                _ => {}
            }
        };

        let _ = inbound.send(ConnectionEvent::Disconnect(reason)).await;
    })
}

/// Parse one text frame. Malformed frames are dropped.
fn parse_client_event(connection_id: &ConnectionId, text: &str) -> Option<ConnectionEvent> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Msg(payload)) => Some(ConnectionEvent::Message {
            text: payload.text,
            sender: payload.sender,
        }),
        Err(e) => {
            tracing::warn!("Dropping malformed frame from '{}': {}", connection_id, e);
            None
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    connection_id: ConnectionId,
    rx: mpsc::Receiver<String>,
) {
    let (sender, receiver) = socket.split();
    let (inbound_tx, mut inbound_rx) = mpsc::channel(state.connection.inbound_capacity);

    let mut guard = state.connections.track();

    let reader_task = reader_loop(
        receiver,
        inbound_tx,
        connection_id,
        state.connection.idle_timeout,
    );
    let mut writer_task = pusher_loop(rx, sender, state.connection.heartbeat_interval());

    // イベントループ: 受信キューのイベントを到着順に 1 つずつ処理する
    let reason = loop {
        let event = tokio::select! {
            biased;
            _ = guard.shutdown_requested() => break DisconnectReason::ServerShutdown,
            _ = &mut writer_task => break DisconnectReason::TransportError,
            event = inbound_rx.recv() => event,
        };

        match event {
            Some(ConnectionEvent::Message { text, sender }) => {
                state
                    .broadcast_router
                    .dispatch(&connection_id, text, sender)
                    .await;
            }
            Some(ConnectionEvent::Disconnect(reason)) => break reason,
            None => break DisconnectReason::ClientClosed,
        }
    };

    reader_task.abort();
    writer_task.abort();

    state
        .disconnect_participant_usecase
        .execute(&connection_id)
        .await;
    tracing::info!(
        "Connection '{}' closed ({:?}) and removed from registry",
        connection_id,
        reason
    );
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_msg_event() {
        // テスト項目: msg イベントが Message イベントに変換される
        // given (前提条件):
        let id = ConnectionId::generate();
        let text = r#"{"event":"msg","data":{"text":"hi","sender":"alice","time":"now"}}"#;

        // when (操作):
        let event = parse_client_event(&id, text);

        // then (期待する結果):
        assert_eq!(
            event,
            Some(ConnectionEvent::Message {
                text: "hi".to_string(),
                sender: "alice".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_malformed_frame_is_dropped() {
        // テスト項目: JSON でないフレームは黙って破棄される
        // given (前提条件):
        let id = ConnectionId::generate();

        // when (操作):
        let event = parse_client_event(&id, "hello there");

        // then (期待する結果):
        assert_eq!(event, None);
    }
}
