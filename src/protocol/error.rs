//! Error types for the dashstream server.
//!
//! `ConnectionError` is the set of causes that end one connection. Every
//! variant maps to the close frame sent to the client and to the level the
//! closure is logged at, so expected lifecycle events (timeouts, shutdown)
//! never show up as faults.

use std::time::Duration;

use crate::protocol::wire::{close_code, CloseFrame};

/// Failure reported by a transport while sending, receiving or closing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Transport error: {message}")]
pub struct TransportError {
    pub message: String,
    /// Size of an inbound message the transport refused to buffer
    pub message_too_long: Option<usize>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
            message_too_long: None,
        }
    }

    pub fn message_too_long(size: usize, message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
            message_too_long: Some(size),
        }
    }
}

/// Failure while producing a dashboard snapshot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    /// The data source could not produce a snapshot
    #[error("Snapshot generation failed: {message}")]
    Generation { message: String },

    /// The snapshot could not be encoded as JSON
    #[error("Snapshot serialization failed: {message}")]
    Serialization { message: String },
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Serialization {
            message: e.to_string(),
        }
    }
}

/// Why a connection was torn down by the server.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// Accumulated message exceeded the configured maximum
    #[error("Message too big: {size} bytes (limit: {limit})")]
    MessageTooBig { size: usize, limit: usize },

    /// Text message whose payload is not UTF-8
    #[error("Text message is not valid UTF-8")]
    InvalidPayload,

    /// No successful receive within the idle timeout
    #[error("Connection idle for {idle:?}")]
    IdleTimeout { idle: Duration },

    /// A single receive did not complete within the receive timeout
    #[error("Receive did not complete within {timeout:?}")]
    ReceiveTimeout { timeout: Duration },

    /// Peer went away without a close handshake
    #[error("Connection closed without a close handshake")]
    PrematureClose,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Process shutdown or an explicit close request from the registry
    #[error("Server is shutting down")]
    Shutdown,
}

/// Severity a connection closure is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseSeverity {
    /// Expected lifecycle event
    Info,
    /// Client or network misbehaved
    Warn,
    /// Server-side fault
    Error,
}

impl ConnectionError {
    /// Close frame sent to the client for this cause
    pub fn close_frame(&self) -> CloseFrame {
        match self {
            ConnectionError::MessageTooBig { .. } => {
                CloseFrame::new(close_code::SIZE, "Message too big")
            }
            ConnectionError::InvalidPayload => {
                CloseFrame::new(close_code::INVALID, "Invalid payload")
            }
            ConnectionError::IdleTimeout { .. } => {
                CloseFrame::new(close_code::NORMAL, "Connection idle timeout.")
            }
            ConnectionError::ReceiveTimeout { .. } => {
                CloseFrame::new(close_code::NORMAL, "Receive timeout")
            }
            ConnectionError::PrematureClose | ConnectionError::Transport(_) => {
                CloseFrame::new(close_code::NORMAL, "Closing")
            }
            ConnectionError::Snapshot(_) => {
                CloseFrame::new(close_code::ERROR, "Internal server error")
            }
            ConnectionError::Shutdown => CloseFrame::new(close_code::AWAY, "Server shutting down"),
        }
    }

    pub fn severity(&self) -> CloseSeverity {
        match self {
            ConnectionError::IdleTimeout { .. }
            | ConnectionError::ReceiveTimeout { .. }
            | ConnectionError::Shutdown => CloseSeverity::Info,
            ConnectionError::MessageTooBig { .. }
            | ConnectionError::InvalidPayload
            | ConnectionError::PrematureClose
            | ConnectionError::Transport(_) => CloseSeverity::Warn,
            ConnectionError::Snapshot(_) => CloseSeverity::Error,
        }
    }

    /// Short machine-friendly name used in log events
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::MessageTooBig { .. } => "message_too_big",
            ConnectionError::InvalidPayload => "invalid_payload",
            ConnectionError::IdleTimeout { .. } => "idle_timeout",
            ConnectionError::ReceiveTimeout { .. } => "receive_timeout",
            ConnectionError::PrematureClose => "premature_close",
            ConnectionError::Transport(_) => "transport_error",
            ConnectionError::Snapshot(_) => "internal_error",
            ConnectionError::Shutdown => "shutdown",
        }
    }
}

/// Startup and configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ServerError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_close_normally() {
        let idle = ConnectionError::IdleTimeout {
            idle: Duration::from_secs(300),
        };
        assert_eq!(
            idle.close_frame(),
            CloseFrame::new(1000, "Connection idle timeout.")
        );
        assert_eq!(idle.severity(), CloseSeverity::Info);

        let recv = ConnectionError::ReceiveTimeout {
            timeout: Duration::from_secs(120),
        };
        assert_eq!(recv.close_frame(), CloseFrame::new(1000, "Receive timeout"));
        assert_eq!(recv.severity(), CloseSeverity::Info);
    }

    #[test]
    fn test_receive_timeout_distinct_from_transport_error() {
        let recv = ConnectionError::ReceiveTimeout {
            timeout: Duration::from_secs(1),
        };
        let transport = ConnectionError::from(TransportError::new("reset"));
        assert_ne!(recv.kind(), transport.kind());
        assert_ne!(recv.severity(), transport.severity());
    }

    #[test]
    fn test_message_too_big_close_frame() {
        let err = ConnectionError::MessageTooBig {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(err.close_frame().code, close_code::SIZE);
        assert_eq!(err.close_frame().reason, "Message too big");
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_snapshot_failure_is_internal_error() {
        let err = ConnectionError::from(SnapshotError::Generation {
            message: "source offline".to_string(),
        });
        assert_eq!(err.close_frame().code, close_code::ERROR);
        assert_eq!(err.severity(), CloseSeverity::Error);
    }

    #[test]
    fn test_shutdown_goes_away() {
        assert_eq!(ConnectionError::Shutdown.close_frame().code, close_code::AWAY);
    }

    #[test]
    fn test_invalid_config_message() {
        let err = ServerError::invalid_config("websocket.max_message_size", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: websocket.max_message_size: must be > 0"
        );
    }
}
