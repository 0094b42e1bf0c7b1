//! HistoryStore の実装
//!
//! - `inmemory`: プロセス内の Vec による実装（開発・テスト用）
//! - `sqlite`: sqlx + SQLite による永続化実装

pub mod inmemory;
pub mod sqlite;

pub use inmemory::InMemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;
