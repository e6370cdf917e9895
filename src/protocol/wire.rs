//! Wire Format Types
//!
//! Types exchanged with clients over a WebSocket connection: message frames
//! as seen by the connection core, close frames, and the dashboard snapshot
//! payload pushed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Message Frames
// ============================================================================

/// Declared payload type of a WebSocket data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Binary,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Binary => write!(f, "binary"),
        }
    }
}

/// One physical chunk of a logical message as delivered by the transport.
///
/// Continuation fragments repeat the kind of the first fragment; the
/// assembler only honours the kind of the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: MessageKind,
    pub data: Vec<u8>,
    pub is_final: bool,
}

impl Fragment {
    pub fn new(kind: MessageKind, data: impl Into<Vec<u8>>, is_final: bool) -> Self {
        Fragment {
            kind,
            data: data.into(),
            is_final,
        }
    }

    /// A single-fragment text message
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::new(MessageKind::Text, text.into().into_bytes(), true)
    }

    /// A single-fragment binary message
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Fragment::new(MessageKind::Binary, data, true)
    }
}

/// A complete logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub data: Vec<u8>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::Text,
            data: text.into().into_bytes(),
        }
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message {
            kind: MessageKind::Binary,
            data: data.into(),
        }
    }

    /// Payload as UTF-8, if this is a text message with a valid payload
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Text => std::str::from_utf8(&self.data).ok(),
            MessageKind::Binary => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What a transport hands to the connection core on each receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Fragment(Fragment),
    /// Peer sent a close frame
    Close(Option<CloseFrame>),
}

// ============================================================================
// Close Frames
// ============================================================================

/// RFC 6455 close codes used by the server.
pub mod close_code {
    /// Normal closure
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away (server shutdown)
    pub const AWAY: u16 = 1001;
    /// Payload data inconsistent with the message type
    pub const INVALID: u16 = 1007;
    /// Message too big to process
    pub const SIZE: u16 = 1009;
    /// Unexpected condition on the server
    pub const ERROR: u16 = 1011;
}

/// Close frame: status code and a short human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        CloseFrame {
            code,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

// ============================================================================
// Dashboard Snapshot
// ============================================================================

/// One freshly generated dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<Metric>,
    pub table_data: Vec<TableRow>,
}

/// A named gauge value with its scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub max_value: f64,
    pub unit: String,
}

/// A row of the dashboard status table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub value: f64,
    pub last_updated: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Serialize to the JSON text sent to clients
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
