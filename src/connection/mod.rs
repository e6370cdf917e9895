//! Connection Lifecycle
//!
//! Everything that happens to one WebSocket connection between the upgrade
//! and the release of its transport.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  ConnectionRegistry (shared, DashMap)                       |
//! |    id -> RegisteredConnection { state, cancel, completion } |
//! +-------------------------------------------------------------+
//! |  ConnectionHandler (one task per connection)                |
//! |    Transport --fragments--> MessageAssembler                |
//! |        |                        |                           |
//! |    TimeoutGovernor          Command::parse                  |
//! |                                 |                           |
//! |                    reply / echo / stream::run               |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Module Structure
//!
//! - `transport` - Transport seam and the axum WebSocket adapter
//! - `timeout` - Idle and receive deadlines
//! - `registry` - Process-wide set of open connections
//! - `stream` - Periodic snapshot push loop
//! - `handler` - Per-connection state machine

pub mod handler;
pub mod registry;
pub mod stream;
pub mod timeout;
pub mod transport;

use std::sync::atomic::{AtomicU8, Ordering};

pub use handler::{ConnectionHandler, ConnectionSettings};
pub use registry::{ConnectionRegistry, RegisteredConnection, SweepReport};
pub use timeout::{TimeoutGovernor, TimeoutKind};
pub use transport::{Transport, WebSocketTransport};

/// Opaque connection identifier, unique for the process lifetime
pub type ConnectionId = String;

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Lock-free lifecycle cell shared between a handler and the registry.
///
/// State only moves forward; an attempt to go back is ignored.
#[derive(Debug)]
pub struct ConnectionStatus {
    state: AtomicU8,
}

impl ConnectionStatus {
    pub fn new() -> Self {
        ConnectionStatus {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance to `next`; returns false if the state was already at or past it
    pub fn advance(&self, next: ConnectionState) -> bool {
        let next = next as u8;
        self.state.fetch_max(next, Ordering::AcqRel) < next
    }

    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}
