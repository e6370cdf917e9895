//! Connection Registry
//!
//! Process-wide set of open connections, keyed by a generated identifier.
//! Thread-safe via an internal `DashMap`; callers never lock.
//!
//! The registry never reads from or writes to a connection. Each entry holds
//! only what is needed to observe the connection and ask it to close: its
//! lifecycle state, its cancellation token, and a completion signal the
//! handler fires once its cleanup has finished.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ConnectionId, ConnectionState, ConnectionStatus};

/// Result of a connection's close handshake, reported on completion
pub type CloseResult = Result<(), String>;

/// Registry-side view of one connection.
#[derive(Debug, Clone)]
pub struct RegisteredConnection {
    status: Arc<ConnectionStatus>,
    cancel: CancellationToken,
    completion: watch::Receiver<Option<CloseResult>>,
}

impl RegisteredConnection {
    pub fn new(
        status: Arc<ConnectionStatus>,
        cancel: CancellationToken,
        completion: watch::Receiver<Option<CloseResult>>,
    ) -> Self {
        RegisteredConnection {
            status,
            cancel,
            completion,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    /// Ask the connection to close and wait for its cleanup to finish.
    ///
    /// Fails if the close handshake failed or cleanup did not finish within
    /// `timeout`.
    pub async fn request_close(&self, timeout: Duration) -> CloseResult {
        self.cancel.cancel();
        let mut completion = self.completion.clone();
        let waited =
            tokio::time::timeout(timeout, completion.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(result)) => result.clone().unwrap_or(Ok(())),
            Ok(Err(_)) => Err("handler exited without reporting completion".to_string()),
            Err(_) => Err(format!("close did not complete within {timeout:?}")),
        }
    }
}

/// Outcome of [`ConnectionRegistry::close_all`]
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Connections that closed cleanly
    pub closed: usize,
    /// Connections whose close attempt failed, with the reason
    pub failed: Vec<(ConnectionId, String)>,
}

impl SweepReport {
    pub fn attempted(&self) -> usize {
        self.closed + self.failed.len()
    }
}

/// Manages all open connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, RegisteredConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection under a freshly generated identifier.
    pub fn register(&self, connection: RegisteredConnection) -> ConnectionId {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            // Entry API keeps check-and-insert atomic per shard
            if let Entry::Vacant(slot) = self.connections.entry(id.clone()) {
                slot.insert(connection);
                return id;
            }
        }
    }

    /// Remove a connection. Returns whether it was present.
    pub fn deregister(&self, id: &str) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of registered connections at this instant
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Registered identifiers at this instant, in no particular order
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn state(&self, id: &str) -> Option<ConnectionState> {
        self.connections.get(id).map(|e| e.value().state())
    }

    /// Close every registered connection concurrently.
    ///
    /// Each entry is removed as soon as its own attempt finishes, whether it
    /// succeeded or not; one failure never stops the sweep. Returns once
    /// every attempt has finished.
    pub async fn close_all(&self, timeout: Duration) -> SweepReport {
        // Snapshot first so no shard lock is held across an await
        let targets: Vec<(ConnectionId, RegisteredConnection)> = self
            .connections
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        info!(connections = targets.len(), "ws_close_all_start");

        let attempts = targets.into_iter().map(|(id, connection)| async move {
            let result = connection.request_close(timeout).await;
            self.connections.remove(&id);
            (id, result)
        });

        let mut report = SweepReport::default();
        for (id, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    debug!(connection_id = %id, "ws_close_all_closed");
                    report.closed += 1;
                }
                Err(reason) => {
                    warn!(connection_id = %id, reason = %reason, "ws_close_all_failed");
                    report.failed.push((id, reason));
                }
            }
        }

        info!(
            closed = report.closed,
            failed = report.failed.len(),
            "ws_close_all_done"
        );
        report
    }
}
