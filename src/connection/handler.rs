//! Connection Handler
//!
//! Drives one connection end-to-end:
//!
//! ```text
//! Connecting ──register──▶ Open ──close / violation / timeout / fault / shutdown──▶ Closing ──▶ Closed
//!                          receive loop                                   best-effort     release transport,
//!                          (reassemble, dispatch)                         close handshake deregister
//! ```
//!
//! Cleanup is owned by a drop guard, so the transport is released and the
//! registry entry removed exactly once on every exit path, including the
//! task being dropped mid-await.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::registry::{CloseResult, ConnectionRegistry, RegisteredConnection};
use super::stream::{self, StreamEnd};
use super::timeout::TimeoutGovernor;
use super::transport::Transport;
use super::{ConnectionId, ConnectionState, ConnectionStatus};
use crate::config::WebSocketConfig;
use crate::generator::SnapshotSource;
use crate::protocol::command::Command;
use crate::protocol::error::{CloseSeverity, ConnectionError, TransportError};
use crate::protocol::frame::{Assembly, MessageAssembler};
use crate::protocol::wire::{Inbound, Message, MessageKind};

/// Per-connection policies, derived from [`WebSocketConfig`]
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub max_message_size: usize,
    pub idle_timeout: Option<Duration>,
    pub receive_timeout: Option<Duration>,
    pub close_timeout: Duration,
    pub stream_interval: Duration,
}

impl From<&WebSocketConfig> for ConnectionSettings {
    fn from(config: &WebSocketConfig) -> Self {
        ConnectionSettings {
            max_message_size: config.max_message_size,
            idle_timeout: config.idle_timeout(),
            receive_timeout: config.receive_timeout(),
            close_timeout: config.close_timeout(),
            stream_interval: config.stream_interval(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings::from(&WebSocketConfig::default())
    }
}

/// Registry membership of a live connection. Dropping it closes the books:
/// state goes to `Closed`, the entry is removed, and anyone waiting in
/// `close_all` is told how the close went.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    status: Arc<ConnectionStatus>,
    completion: watch::Sender<Option<CloseResult>>,
    result: Option<CloseResult>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.status.advance(ConnectionState::Closed);
        self.registry.deregister(&self.id);
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err("connection task ended before closing".to_string()));
        self.completion.send_replace(Some(result));
    }
}

/// What the receive loop does after a message was dispatched
enum Dispatched {
    Continue,
    StreamEnded(StreamEnd),
}

/// Owns one connection's transport for its whole lifetime.
pub struct ConnectionHandler<T: Transport> {
    transport: T,
    settings: ConnectionSettings,
    assembler: MessageAssembler,
    governor: TimeoutGovernor,
    source: Arc<dyn SnapshotSource>,
    status: Arc<ConnectionStatus>,
    cancel: CancellationToken,
    // Declared last: dropped after the transport
    registration: Registration,
}

impl<T: Transport> ConnectionHandler<T> {
    /// Register a freshly upgraded connection and move it to `Open`.
    ///
    /// The connection's cancellation token is a child of `shutdown`.
    pub fn accept(
        transport: T,
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn SnapshotSource>,
        settings: ConnectionSettings,
        shutdown: &CancellationToken,
    ) -> Self {
        let status = Arc::new(ConnectionStatus::new());
        let cancel = shutdown.child_token();
        let (completion, completion_rx) = watch::channel(None);

        let id = registry.register(RegisteredConnection::new(
            Arc::clone(&status),
            cancel.clone(),
            completion_rx,
        ));
        status.advance(ConnectionState::Open);

        ConnectionHandler {
            transport,
            assembler: MessageAssembler::new(settings.max_message_size),
            governor: TimeoutGovernor::new(settings.idle_timeout, settings.receive_timeout),
            settings,
            source,
            status: Arc::clone(&status),
            cancel,
            registration: Registration {
                registry,
                id,
                status,
                completion,
                result: None,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.registration.id
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    /// Token that closes this connection when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the connection to completion.
    ///
    /// `Ok` means the client closed the connection; `Err` carries the cause
    /// of a server-initiated close. Either way the connection is fully
    /// cleaned up when this returns.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let span = tracing::info_span!("ws_connection", connection_id = %self.id());
        self.run_to_close().instrument(span).await
    }

    async fn run_to_close(mut self) -> Result<(), ConnectionError> {
        info!(
            active_connections = self.registration.registry.count(),
            "ws_connection_open"
        );

        let outcome = self.receive_loop().await;
        self.status.advance(ConnectionState::Closing);
        log_outcome(&outcome);

        let close_result = self.close_handshake(&outcome).await;

        let ConnectionHandler {
            transport,
            mut registration,
            ..
        } = self;
        drop(transport);
        registration.result = Some(close_result);
        drop(registration);

        debug!("ws_connection_closed");
        outcome
    }

    async fn receive_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(ConnectionError::Shutdown);
            }
            self.governor.check_idle()?;

            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(ConnectionError::Shutdown),
                received = self.governor.bound(self.transport.recv()) => received?,
            };

            let inbound = match received {
                Some(Ok(inbound)) => inbound,
                Some(Err(TransportError {
                    message_too_long: Some(size),
                    ..
                })) => {
                    return Err(ConnectionError::MessageTooBig {
                        size,
                        limit: self.settings.max_message_size,
                    });
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ConnectionError::PrematureClose),
            };
            self.governor.touch();

            let fragment = match inbound {
                Inbound::Fragment(fragment) => fragment,
                Inbound::Close(frame) => {
                    debug!(
                        code = frame.as_ref().map(|f| f.code),
                        "ws_close_frame_received"
                    );
                    return Ok(());
                }
            };

            match self.assembler.accumulate(fragment) {
                Assembly::Continue => {}
                Assembly::SizeExceeded { size, limit } => {
                    return Err(ConnectionError::MessageTooBig { size, limit });
                }
                Assembly::Complete(message) => match self.dispatch(message).await? {
                    Dispatched::Continue => {}
                    Dispatched::StreamEnded(StreamEnd::Cancelled) => {
                        return Err(ConnectionError::Shutdown);
                    }
                    Dispatched::StreamEnded(StreamEnd::Disconnected(cause)) => {
                        return Err(cause.map_or(ConnectionError::PrematureClose, Into::into));
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, message: Message) -> Result<Dispatched, ConnectionError> {
        if message.kind == MessageKind::Text && message.as_text().is_none() {
            return Err(ConnectionError::InvalidPayload);
        }

        let command = Command::parse(&message);
        debug!(
            command = command.name(),
            kind = %message.kind,
            size = message.len(),
            "ws_message_received"
        );

        match command {
            Command::GetDashboardData => {
                let reply = stream::snapshot_message(self.source.as_ref())?;
                self.transport.send(reply).await?;
            }
            Command::StartStream => {
                info!("ws_stream_start");
                let (end, sent) = stream::run(
                    &mut self.transport,
                    self.source.as_ref(),
                    &self.status,
                    &self.cancel,
                    self.settings.stream_interval,
                )
                .await?;
                info!(sent, end = ?end, "ws_stream_end");
                return Ok(Dispatched::StreamEnded(end));
            }
            Command::Echo => self.transport.send(message).await?,
        }
        Ok(Dispatched::Continue)
    }

    /// One best-effort close handshake. Failures are reported to the
    /// registry but never escalate.
    async fn close_handshake(&mut self, outcome: &Result<(), ConnectionError>) -> CloseResult {
        let frame = outcome.as_ref().err().map(ConnectionError::close_frame);
        match tokio::time::timeout(self.settings.close_timeout, self.transport.close(frame)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!(error = %e, "ws_close_handshake_failed");
                Err(e.to_string())
            }
            Err(_) => {
                debug!(timeout = ?self.settings.close_timeout, "ws_close_handshake_timeout");
                Err("close handshake timed out".to_string())
            }
        }
    }
}

fn log_outcome(outcome: &Result<(), ConnectionError>) {
    let Err(e) = outcome else {
        debug!("ws_client_closed");
        return;
    };
    let frame = e.close_frame();
    match e.severity() {
        CloseSeverity::Info => {
            info!(cause = e.kind(), code = frame.code, reason = %e, "ws_connection_closing");
        }
        CloseSeverity::Warn => {
            warn!(cause = e.kind(), code = frame.code, reason = %e, "ws_connection_closing");
        }
        CloseSeverity::Error => {
            error!(cause = e.kind(), code = frame.code, reason = %e, "ws_connection_closing");
        }
    }
}
