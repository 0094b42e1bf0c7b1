//! Live WebSocket connection tracking for shutdown.
//!
//! Upgraded connections are not covered by `axum::serve`'s graceful
//! shutdown. They are told to stop through a `watch` channel and counted
//! until their tasks have disconnected from the registry.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

struct TrackerInner {
    shutdown: watch::Sender<bool>,
    active: watch::Sender<usize>,
}

/// Shared handle; clones refer to the same set of connections
#[derive(Clone)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        let (active, _) = watch::channel(0);
        Self {
            inner: Arc::new(TrackerInner { shutdown, active }),
        }
    }

    /// Count a connection as active until the returned guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.send_modify(|active| *active += 1);
        ConnectionGuard {
            shutdown: self.inner.shutdown.subscribe(),
            inner: self.inner.clone(),
        }
    }

    /// Number of connections currently tracked
    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }

    /// Ask every connection to stop and wait until all of them have.
    ///
    /// Returns `false` if some were still running after `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.shutdown.send_replace(true);

        let mut active = self.inner.active.subscribe();
        let drained = async move {
            while *active.borrow_and_update() > 0 {
                if active.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// Held by one connection task for as long as it runs
pub struct ConnectionGuard {
    shutdown: watch::Receiver<bool>,
    inner: Arc<TrackerInner>,
}

impl ConnectionGuard {
    /// Resolve once shutdown has been requested (immediately if it already was)
    pub async fn shutdown_requested(&mut self) {
        while !*self.shutdown.borrow_and_update() {
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.inner.active.send_modify(|active| *active -= 1);
    }
}
