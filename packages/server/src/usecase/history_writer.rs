//! UseCase: 履歴の非同期書き込み
//!
//! ブロードキャスト経路から切り離された単一のワーカータスクが、キューに積まれた
//! 順に `HistoryStore::append` を呼び出します。
//!
//! - `enqueue` はブロックしない（配信が永続化を待つことはない）
//! - 追記順 = enqueue 順
//! - 追記の失敗はログに出すだけで、呼び出し元には返らない

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::domain::{ChatMessage, HistoryStore};

enum WriterJob {
    Append(ChatMessage),
    Flush(oneshot::Sender<()>),
}

/// Handle to the detached history worker
#[derive(Clone)]
pub struct HistoryWriter {
    jobs: mpsc::UnboundedSender<WriterJob>,
}

impl HistoryWriter {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// The worker stops once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn(store: Arc<dyn HistoryStore>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, rx));
        Self { jobs }
    }

    /// Queue `message` for appending. Never waits.
    pub fn enqueue(&self, message: ChatMessage) {
        if self.jobs.send(WriterJob::Append(message)).is_err() {
            tracing::warn!("History writer has stopped; message not persisted");
        }
    }

    /// Wait until every message queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.jobs.send(WriterJob::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_worker(store: Arc<dyn HistoryStore>, mut rx: mpsc::UnboundedReceiver<WriterJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            WriterJob::Append(message) => {
                let room = message.room.clone();
                match store.append(message).await {
                    Ok(()) => tracing::debug!("Persisted message for room '{}'", room),
                    Err(e) => {
                        tracing::warn!("Failed to persist message for room '{}': {}", room, e)
                    }
                }
            }
            WriterJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("History writer stopped");
}
