//! `dashstream` Protocol
//!
//! Client-server communication: HTTP endpoints, wire types, message
//! reassembly, command dispatch and error handling.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                   dashstream Protocol                       |
//! +-------------------------------------------------------------+
//! |  HTTP Endpoints:                                            |
//! |    - /health: health check                                  |
//! |    - /live: liveness probe                                  |
//! |    - /stats: open connections                               |
//! |    - /ws: WebSocket (commands, echo, snapshot stream)       |
//! +-------------------------------------------------------------+
//! |  Wire Format: JSON snapshots, raw text/binary echo          |
//! |  Transport: WebSocket                                       |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Module Structure
//!
//! - `wire` - Wire types (`Message`, `Fragment`, `CloseFrame`, `DashboardSnapshot`)
//! - `frame` - Fragment reassembly with a size limit
//! - `command` - Text command recognition
//! - `error` - Protocol error types
//! - `handler` - Shared server state and shutdown coordination
//! - `rest` - HTTP handlers and routing

pub mod command;
pub mod error;
pub mod frame;
pub mod handler;
pub mod rest;
pub mod wire;

// Re-export error types
pub use error::{ConnectionError, ServerError, SnapshotError, TransportError};

// Re-export wire types
pub use wire::{CloseFrame, DashboardSnapshot, Fragment, Message, MessageKind, Metric, TableRow};

pub use command::Command;
pub use frame::{Assembly, MessageAssembler};
pub use handler::Handler;

// Protocol Constants
/// Default HTTP server port
pub const DEFAULT_PORT: u16 = 8080;

/// WebSocket endpoint path
pub const WS_PATH: &str = "/ws";
