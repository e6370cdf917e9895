//! Handler for `dashstream`
//!
//! Shared server state used by the HTTP layer: validated configuration, the
//! connection registry, the snapshot source, and the primitives that
//! coordinate shutdown (a process-wide cancellation token plus a tracker of
//! connection tasks).

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{
    ConnectionHandler, ConnectionRegistry, ConnectionSettings, SweepReport, Transport,
};
use crate::generator::{MockDataGenerator, SnapshotSource};
use crate::protocol::error::ServerError;
use crate::protocol::wire::{close_code, CloseFrame};

/// Process-wide server state, shared as `Arc<Handler>`.
pub struct Handler {
    config: Config,
    settings: ConnectionSettings,
    registry: Arc<ConnectionRegistry>,
    source: Arc<dyn SnapshotSource>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    start_time: Instant,
}

impl Handler {
    /// Create a handler with an explicit snapshot source.
    pub fn new(config: Config, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            settings: ConnectionSettings::from(&config.websocket),
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            source,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            start_time: Instant::now(),
        }
    }

    /// Validate `config` and create a handler backed by the mock generator.
    pub fn from_config(config: Config) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self::new(config, Arc::new(MockDataGenerator::new())))
    }

    /// Replace the snapshot source (tests inject failing or fixed sources).
    pub fn with_snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }

    /// Once true, new connections are refused
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Process-wide token; every connection token is a child of it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register `transport` as a new open connection without running it.
    pub fn accept<T: Transport>(&self, transport: T) -> ConnectionHandler<T> {
        ConnectionHandler::accept(
            transport,
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            self.settings.clone(),
            &self.shutdown,
        )
    }

    /// Serve one upgraded connection until it closes.
    ///
    /// Connections arriving after shutdown began are closed immediately with
    /// 1001 and never registered.
    pub async fn serve_connection<T: Transport>(&self, mut transport: T) {
        if self.is_shutting_down() {
            debug!("ws_connection_refused_shutdown");
            let frame = CloseFrame::new(close_code::AWAY, "Server shutting down");
            let _ = tokio::time::timeout(self.settings.close_timeout, transport.close(Some(frame)))
                .await;
            return;
        }
        let connection = self.accept(transport);
        // Outcome is already logged inside the connection span
        let _ = self.tasks.track_future(connection.run()).await;
    }

    /// Stop accepting connections and signal every open one to close.
    pub fn begin_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(
                active_connections = self.registry.count(),
                "shutdown_begin"
            );
        }
        self.shutdown.cancel();
    }

    /// Run the full shutdown sequence.
    ///
    /// Stops accepting, sweeps the registry with `drain_timeout` as the
    /// per-connection bound, then waits (bounded by the same timeout) for
    /// every connection task to finish. Safe to call more than once.
    pub async fn shutdown(&self) -> SweepReport {
        self.begin_shutdown();
        let drain = self.config.shutdown.drain_timeout();

        let report = self.registry.close_all(drain).await;

        self.tasks.close();
        if tokio::time::timeout(drain, self.tasks.wait()).await.is_err() {
            warn!(remaining = self.tasks.len(), "shutdown_drain_timeout");
        }

        info!(
            closed = report.closed,
            failed = report.failed.len(),
            remaining = self.registry.count(),
            "shutdown_complete"
        );
        report
    }
}
