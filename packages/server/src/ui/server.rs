//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use hiroba_shared::time::Clock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    domain::{ConnectionRegistry, HistoryStore, SessionGate},
    infrastructure::encoder::JsonMessageEncoder,
    usecase::{
        BroadcastRouter, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        GetHistoryUseCase, GetRoomDetailUseCase, HistoryWriter,
    },
};

use super::{
    connection_tracker::ConnectionTracker,
    handler::{get_messages, get_room_detail, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// How long shutdown waits for WebSocket connections to disconnect
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket chat relay server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(config, registry, history_store, session_gate, clock);
/// server.run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    /// Wire the use cases together.
    ///
    /// Must be called inside a Tokio runtime: the history writer task is
    /// spawned here.
    pub fn new(
        config: ServerConfig,
        registry: Arc<dyn ConnectionRegistry>,
        history_store: Arc<dyn HistoryStore>,
        session_gate: Arc<dyn SessionGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let history_writer = HistoryWriter::spawn(history_store.clone());

        let state = Arc::new(AppState {
            connect_participant_usecase: ConnectParticipantUseCase::new(
                registry.clone(),
                session_gate,
                clock.clone(),
                config.room.clone(),
            ),
            disconnect_participant_usecase: DisconnectParticipantUseCase::new(registry.clone()),
            broadcast_router: BroadcastRouter::new(
                registry.clone(),
                Arc::new(JsonMessageEncoder),
                history_writer,
                clock,
            ),
            get_history_usecase: GetHistoryUseCase::new(history_store),
            get_room_detail_usecase: GetRoomDetailUseCase::new(registry),
            connection: config.connection.clone(),
            connections: ConnectionTracker::new(),
        });

        Self { config, state }
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/messages", get(get_messages))
            .route("/api/health", get(health_check))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to the configured address and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the configured address
    /// or if there's an error during server execution.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat relay listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Open WebSocket connections are then stopped and removed from the
    /// registry before pending history appends are flushed, so nothing is
    /// dispatched after the flush.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        let open = self.state.connections.active();
        if open > 0 {
            tracing::info!("Closing {} WebSocket connection(s)", open);
        }
        if !self
            .state
            .connections
            .shutdown(CONNECTION_DRAIN_TIMEOUT)
            .await
        {
            tracing::warn!(
                "{} connection(s) still open after {:?}",
                self.state.connections.active(),
                CONNECTION_DRAIN_TIMEOUT
            );
        }

        self.state.broadcast_router.flush_history().await;
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
