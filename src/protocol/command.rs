//! Inbound Command Parsing
//!
//! Completed messages are classified into one of three command classes.
//! Text is trimmed and case-folded before matching; binary messages and any
//! unrecognised text fall through to the echo behaviour.

use crate::protocol::wire::Message;

pub const GET_DASHBOARD_DATA: &str = "get_dashboard_data";
pub const START_STREAM: &str = "start_stream";

/// What the connection should do with a completed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reply once with a fresh snapshot
    GetDashboardData,
    /// Push a snapshot on a fixed interval until the connection ends
    StartStream,
    /// Send the message back unchanged
    Echo,
}

impl Command {
    /// Classify a completed message.
    pub fn parse(message: &Message) -> Command {
        let Some(text) = message.as_text() else {
            return Command::Echo;
        };
        match text.trim().to_lowercase().as_str() {
            GET_DASHBOARD_DATA => Command::GetDashboardData,
            START_STREAM => Command::StartStream,
            _ => Command::Echo,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::GetDashboardData => GET_DASHBOARD_DATA,
            Command::StartStream => START_STREAM,
            Command::Echo => "echo",
        }
    }
}
