//! Shared helpers for integration tests: an in-memory [`Transport`] and
//! builders for handlers that run on it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use dashstream::config::Config;
use dashstream::connection::ConnectionSettings;
use dashstream::protocol::wire::{CloseFrame, Fragment, Inbound, Message};
use dashstream::protocol::{SnapshotError, TransportError};
use dashstream::{DashboardSnapshot, SnapshotSource, Transport};

/// What the server side did with the transport, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Sent(Message),
    Closed(Option<CloseFrame>),
    /// The transport was dropped by its handler
    Released,
}

/// Server half: owned by the connection under test.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    fail_close: bool,
    fail_send: Arc<AtomicBool>,
}

/// Client half: drives the connection and observes what it did.
pub struct Peer {
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, TransportError>>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    fail_send: Arc<AtomicBool>,
}

pub fn pair() -> (MockTransport, Peer) {
    pair_with(false)
}

/// A transport whose close handshake always fails when `fail_close` is set.
pub fn pair_with(fail_close: bool) -> (MockTransport, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let fail_send = Arc::new(AtomicBool::new(false));
    (
        MockTransport {
            inbound: in_rx,
            events: ev_tx,
            fail_close,
            fail_send: Arc::clone(&fail_send),
        },
        Peer {
            inbound: Some(in_tx),
            events: ev_rx,
            fail_send,
        },
    )
}

impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.inbound.recv().await
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::new("peer reset"));
        }
        self.events
            .send(TransportEvent::Sent(message))
            .map_err(|_| TransportError::new("peer gone"))
    }

    async fn close(&mut self, frame: Option<CloseFrame>) -> Result<(), TransportError> {
        let _ = self.events.send(TransportEvent::Closed(frame));
        if self.fail_close {
            return Err(TransportError::new("close handshake failed"));
        }
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        let _ = self.events.send(TransportEvent::Released);
    }
}

impl Peer {
    pub fn push(&self, inbound: Inbound) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(inbound));
        }
    }

    pub fn fragment(&self, fragment: Fragment) {
        self.push(Inbound::Fragment(fragment));
    }

    pub fn text(&self, text: &str) {
        self.fragment(Fragment::text(text));
    }

    pub fn binary(&self, data: &[u8]) {
        self.fragment(Fragment::binary(data.to_vec()));
    }

    pub fn close(&self, frame: Option<CloseFrame>) {
        self.push(Inbound::Close(frame));
    }

    pub fn fail(&self, message: &str) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(TransportError::new(message)));
        }
    }

    /// Report a message the transport refused to buffer
    pub fn refuse_oversized(&self, size: usize) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(TransportError::message_too_long(
                size,
                "Message too long",
            )));
        }
    }

    /// End the inbound stream without a close frame
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Make every further server send fail
    pub fn break_sends(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        tokio::time::timeout(Duration::from_secs(3600), self.events.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_sent(&mut self) -> Message {
        match self.next_event().await {
            Some(TransportEvent::Sent(message)) => message,
            other => panic!("expected a sent message, got {other:?}"),
        }
    }

    /// Wait for the close frame the server sent
    pub async fn next_close(&mut self) -> Option<CloseFrame> {
        loop {
            match self.next_event().await {
                Some(TransportEvent::Closed(frame)) => return frame,
                Some(TransportEvent::Sent(_)) => continue,
                other => panic!("expected a close, got {other:?}"),
            }
        }
    }

    /// Drain events until the transport is released, returning everything seen
    pub async fn until_released(&mut self) -> Vec<TransportEvent> {
        let mut seen = Vec::new();
        while let Some(event) = self.next_event().await {
            let released = event == TransportEvent::Released;
            seen.push(event);
            if released {
                break;
            }
        }
        seen
    }

    pub fn try_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }
}

/// Settings with the idle and receive timeouts switched off
pub fn no_timeouts() -> ConnectionSettings {
    ConnectionSettings {
        idle_timeout: None,
        receive_timeout: None,
        ..ConnectionSettings::default()
    }
}

pub fn config_without_timeouts() -> Config {
    let mut config = Config::default();
    config.websocket.idle_timeout_secs = 0;
    config.websocket.receive_timeout_secs = 0;
    config.websocket.keep_alive_interval_secs = 0;
    config
}

/// Snapshot source that always fails
pub struct BrokenSource;

impl SnapshotSource for BrokenSource {
    fn snapshot(&self) -> Result<DashboardSnapshot, SnapshotError> {
        Err(SnapshotError::Generation {
            message: "sensor offline".to_string(),
        })
    }
}

pub fn parse_snapshot(message: &Message) -> DashboardSnapshot {
    let text = message.as_text().expect("snapshot is text");
    serde_json::from_str(text).expect("snapshot is valid JSON")
}
