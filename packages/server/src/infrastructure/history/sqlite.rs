//! SQLite HistoryStore 実装
//!
//! `messages` テーブルに 1 メッセージ 1 行で追記します。
//! `seq` (AUTOINCREMENT) が追記順を表し、`list` はこの順で返します。

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use crate::domain::{ChatMessage, HistoryError, HistoryStore, RoomId, Timestamp};

const CREATE_MESSAGES_TABLE: &str = "CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    room TEXT NOT NULL,
    sender TEXT NOT NULL,
    text TEXT NOT NULL,
    time INTEGER NOT NULL
)";

const CREATE_ROOM_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_room_seq ON messages (room, seq)";

/// SQLite による HistoryStore 実装
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Connect to `database_url` and make sure the schema exists.
    ///
    /// `sqlite::memory:` gets a single connection that is never recycled, so
    /// every query sees the same in-memory database.
    pub async fn connect(database_url: &str) -> Result<Self, HistoryError> {
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(unavailable)?
            .create_if_missing(true);
        let pool = options
            .connect_with(connect_options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!("SQLite history store ready at {}", database_url);

        Ok(store)
    }

    async fn migrate(&self) -> Result<(), HistoryError> {
        sqlx::query(CREATE_MESSAGES_TABLE)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        sqlx::query(CREATE_ROOM_INDEX)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    /// Close the pool; every later call fails with `PersistenceUnavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn unavailable(e: sqlx::Error) -> HistoryError {
    HistoryError::PersistenceUnavailable(e.to_string())
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, message: ChatMessage) -> Result<(), HistoryError> {
        sqlx::query("INSERT INTO messages (room, sender, text, time) VALUES (?, ?, ?, ?)")
            .bind(message.room.as_str())
            .bind(message.sender.as_str())
            .bind(message.text.as_str())
            .bind(message.timestamp.value())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn list(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, HistoryError> {
        let rows = sqlx::query("SELECT sender, text, time FROM messages WHERE room = ? ORDER BY seq")
            .bind(room_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.into_iter()
            .map(|row| {
                Ok(ChatMessage::new(
                    row.try_get("text").map_err(unavailable)?,
                    row.try_get("sender").map_err(unavailable)?,
                    room_id.clone(),
                    Timestamp::new(row.try_get("time").map_err(unavailable)?),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, room: &str, time: i64) -> ChatMessage {
        ChatMessage::new(
            text.to_string(),
            "alice".to_string(),
            RoomId::new(room.to_string()).unwrap(),
            Timestamp::new(time),
        )
    }

    async fn create_test_store() -> SqliteHistoryStore {
        SqliteHistoryStore::connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite should be available")
    }

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        // テスト項目: 追記したメッセージが追記順で取得できる
        // given (前提条件):
        let store = create_test_store().await;
        let chat = RoomId::new("chat".to_string()).unwrap();

        // when (操作):
        store.append(message("first", "chat", 20)).await.unwrap();
        store.append(message("second", "chat", 10)).await.unwrap();
        store.append(message("other", "random", 15)).await.unwrap();
        let history = store.list(&chat).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            history,
            vec![message("first", "chat", 20), message("second", "chat", 10)]
        );
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_on_schema() {
        // テスト項目: スキーマ作成を二度実行してもエラーにならない
        // given (前提条件):
        let store = create_test_store().await;

        // when (操作):
        let result = store.migrate().await;

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_reports_unavailable() {
        // テスト項目: プールが閉じられると PersistenceUnavailable が返る
        // given (前提条件):
        let store = create_test_store().await;
        store.close().await;

        // when (操作):
        let append = store.append(message("lost", "chat", 1)).await;
        let list = store.list(&RoomId::new("chat".to_string()).unwrap()).await;

        // then (期待する結果):
        assert!(matches!(append, Err(HistoryError::PersistenceUnavailable(_))));
        assert!(matches!(list, Err(HistoryError::PersistenceUnavailable(_))));
    }
}
