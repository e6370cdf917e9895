//! Snapshot Streaming
//!
//! Pushes a freshly generated snapshot to one connection on a fixed
//! interval. Sends never overlap: the next snapshot is generated only after
//! the previous send has completed. Cancellation is observed before every
//! iteration and during the sleep, never in the middle of a send.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::Transport;
use super::ConnectionStatus;
use crate::generator::SnapshotSource;
use crate::protocol::error::{ConnectionError, SnapshotError, TransportError};
use crate::protocol::wire::Message;

/// Why a streaming loop stopped without a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The cancellation token fired (shutdown or registry close)
    Cancelled,
    /// The connection is no longer open; a send failed or state moved on
    Disconnected(Option<TransportError>),
}

/// Generate a snapshot and encode it as a text message.
pub fn snapshot_message(source: &dyn SnapshotSource) -> Result<Message, ConnectionError> {
    let snapshot = source.snapshot()?;
    let json = snapshot.to_json().map_err(SnapshotError::from)?;
    Ok(Message::text(json))
}

/// Run the push loop until the connection ends or `cancel` fires.
///
/// Returns `Err` only for snapshot failures, which are fatal for the
/// connection. Returns the number of snapshots sent alongside the end cause.
pub async fn run<T: Transport>(
    transport: &mut T,
    source: &dyn SnapshotSource,
    status: &ConnectionStatus,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<(StreamEnd, u64), ConnectionError> {
    let mut sent: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Ok((StreamEnd::Cancelled, sent));
        }
        if !status.is_open() {
            return Ok((StreamEnd::Disconnected(None), sent));
        }

        let message = snapshot_message(source)?;
        if let Err(e) = transport.send(message).await {
            debug!(error = %e, sent, "ws_stream_send_failed");
            return Ok((StreamEnd::Disconnected(Some(e)), sent));
        }
        sent += 1;

        tokio::select! {
            () = cancel.cancelled() => return Ok((StreamEnd::Cancelled, sent)),
            () = tokio::time::sleep(interval) => {}
        }
    }
}
