//! # dashstream
//!
//! A WebSocket server that serves a live dashboard: mock system metrics and
//! a service status table, delivered on demand or pushed on a fixed cadence.
//!
//! ## Connection Pipeline
//!
//! ```text
//! HTTP upgrade (/ws)
//!     ↓
//! [WebSocketTransport]     → fragments of receive_buffer_size bytes
//!     ↓
//! [MessageAssembler]       → complete messages, size limit enforced
//!     ↓
//! [Command::parse]         → get_dashboard_data | start_stream | echo
//!     ↓
//! [ConnectionHandler]      → reply, echo, or stream::run
//! ```
//!
//! Every open connection is tracked in a [`ConnectionRegistry`]; shutdown
//! refuses new upgrades, sweeps the registry with `close_all`, and waits for
//! the connection tasks to drain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dashstream::{Config, Handler};
//! use dashstream::protocol::rest;
//!
//! let config = Config::load()?;
//! let handler = Arc::new(Handler::from_config(config.clone())?);
//! rest::start_http_server(handler, &config.http).await?;
//! ```

pub mod config;
pub mod connection;
pub mod generator;
pub mod protocol;

pub use config::Config;
pub use connection::{
    ConnectionHandler, ConnectionId, ConnectionRegistry, ConnectionSettings, ConnectionState,
    SweepReport, Transport, WebSocketTransport,
};
pub use generator::{MockDataGenerator, SnapshotSource};
pub use protocol::{ConnectionError, DashboardSnapshot, Handler, Message, ServerError};
