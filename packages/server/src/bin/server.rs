//! Real-time chat relay server.
//!
//! Every WebSocket connection is joined to one chat room; `msg` events are
//! broadcast to the whole room (sender included) as `dist` events and kept in
//! the room history served by `GET /messages`.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --database-url sqlite://hiroba.db
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use hiroba_server::{
    config::{ConnectionSettings, DEFAULT_ROOM, HistoryBackend, ServerConfig},
    domain::HistoryStore,
    infrastructure::{
        history::{InMemoryHistoryStore, SqliteHistoryStore},
        registry::InMemoryConnectionRegistry,
        session_gate::HeaderSessionGate,
    },
    ui::Server,
};
use hiroba_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "WebSocket chat relay with room broadcast and history", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIROBA_PORT", default_value = "8080")]
    port: u16,

    /// Room every connection is joined to
    #[arg(short = 'r', long, env = "HIROBA_ROOM", default_value = DEFAULT_ROOM)]
    room: String,

    /// Outbound messages buffered per connection before it is dropped
    #[arg(long, env = "HIROBA_MAILBOX_CAPACITY", default_value = "64")]
    mailbox_capacity: usize,

    /// Inbound events buffered per connection before reading pauses
    #[arg(long, env = "HIROBA_INBOUND_CAPACITY", default_value = "32")]
    inbound_capacity: usize,

    /// Close connections idle for this many seconds (0 disables)
    #[arg(long, env = "HIROBA_IDLE_TIMEOUT_SECS", default_value = "300")]
    idle_timeout_secs: u64,

    /// SQLite URL for chat history (in-memory history if omitted)
    #[arg(long, env = "HIROBA_DATABASE_URL")]
    database_url: Option<String>,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, hiroba_server::config::ConfigError> {
        let connection = ConnectionSettings {
            mailbox_capacity: self.mailbox_capacity,
            inbound_capacity: self.inbound_capacity,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        };
        let history = match self.database_url {
            Some(database_url) => HistoryBackend::Sqlite { database_url },
            None => HistoryBackend::InMemory,
        };
        ServerConfig::new(self.host, self.port, self.room, connection, history)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize dependencies in order:
    // 1. HistoryStore
    // 2. ConnectionRegistry / SessionGate / Clock
    // 3. Server

    // 1. Create HistoryStore
    let history_store: Arc<dyn HistoryStore> = match &config.history {
        HistoryBackend::InMemory => {
            tracing::info!("Using in-memory chat history");
            Arc::new(InMemoryHistoryStore::new())
        }
        HistoryBackend::Sqlite { database_url } => {
            match SqliteHistoryStore::connect(database_url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::error!("Failed to open history database: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    // 2. Create registry and collaborators
    let registry = Arc::new(InMemoryConnectionRegistry::new());
    let session_gate = Arc::new(HeaderSessionGate);
    let clock = Arc::new(SystemClock);

    // 3. Create and run the server
    let server = Server::new(config, registry, history_store, session_gate, clock);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
