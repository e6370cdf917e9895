//! Transport Seam
//!
//! The connection core talks to its peer through [`Transport`]. Production
//! connections use [`WebSocketTransport`], which wraps an upgraded axum
//! socket; tests substitute an in-memory implementation.
//!
//! Control frames stay inside the transport: pings are answered by axum,
//! pongs are dropped, and keep-alive pings are sent while waiting for input.
//! None of them reach the core or count as activity.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use axum::extract::ws::{self, WebSocket};
use futures_util::SinkExt;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as WsError};

use crate::protocol::error::TransportError;
use crate::protocol::wire::{CloseFrame, Fragment, Inbound, Message, MessageKind};

/// Bidirectional message transport owned by a single connection handler.
///
/// Implementations are driven strictly sequentially: at most one of the
/// three operations is in flight at any time.
pub trait Transport: Send + 'static {
    /// Next fragment or close frame. `None` means the stream ended without a
    /// close handshake. Must be cancel-safe: dropping the future loses no data.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, TransportError>>> + Send;

    /// Send one complete message.
    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start (or, after a peer close, complete) the close handshake.
    fn close(
        &mut self,
        frame: Option<CloseFrame>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Split a complete message into fragments of at most `chunk_size` bytes.
///
/// An empty message becomes one empty final fragment.
pub fn fragment(kind: MessageKind, data: Vec<u8>, chunk_size: usize) -> VecDeque<Fragment> {
    if data.len() <= chunk_size {
        return VecDeque::from([Fragment::new(kind, data, true)]);
    }
    let count = data.len().div_ceil(chunk_size);
    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| Fragment::new(kind, chunk.to_vec(), i + 1 == count))
        .collect()
}

/// [`Transport`] over an upgraded axum WebSocket.
///
/// Reads go through a fixed-size receive buffer: each inbound message is
/// handed to the core in fragments of `receive_buffer_size` bytes.
pub struct WebSocketTransport {
    socket: WebSocket,
    receive_buffer_size: usize,
    pending: VecDeque<Fragment>,
    keep_alive: Option<Interval>,
    close_received: bool,
}

impl WebSocketTransport {
    pub fn new(
        socket: WebSocket,
        receive_buffer_size: usize,
        keep_alive_interval: Option<Duration>,
    ) -> Self {
        let keep_alive = keep_alive_interval.map(|period| {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        WebSocketTransport {
            socket,
            receive_buffer_size: receive_buffer_size.max(1),
            pending: VecDeque::new(),
            keep_alive,
            close_received: false,
        }
    }
}

/// Classify a socket read failure.
///
/// A message over the socket's size limit surfaces as a tungstenite capacity
/// error; it is reported with its size so the connection closes with 1009.
fn read_error(e: axum::Error) -> TransportError {
    let message = e.to_string();
    let inner = e.into_inner();
    if let Some(WsError::Capacity(CapacityError::MessageTooLong { size, .. })) =
        inner.downcast_ref::<WsError>()
    {
        return TransportError::message_too_long(*size, message);
    }
    // The error text is the fallback when axum links another tungstenite
    match too_long_size(&message) {
        Some(size) => TransportError::message_too_long(size, message),
        None => TransportError::new(message),
    }
}

/// Size from a "Message too long: <size> > <max>" capacity message
fn too_long_size(message: &str) -> Option<usize> {
    let (_, rest) = message.split_once("Message too long: ")?;
    rest.split_whitespace().next()?.parse().ok()
}

enum SocketEvent {
    KeepAlive,
    Frame(Option<Result<ws::Message, axum::Error>>),
}

impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Some(Ok(Inbound::Fragment(fragment)));
            }

            let Self {
                socket, keep_alive, ..
            } = self;
            let event = match keep_alive {
                Some(interval) => tokio::select! {
                    _ = interval.tick() => SocketEvent::KeepAlive,
                    frame = socket.recv() => SocketEvent::Frame(frame),
                },
                None => SocketEvent::Frame(socket.recv().await),
            };

            match event {
                SocketEvent::KeepAlive => {
                    if let Err(e) = self.socket.send(ws::Message::Ping(Vec::new())).await {
                        return Some(Err(TransportError::new(e.to_string())));
                    }
                }
                SocketEvent::Frame(None) => return None,
                SocketEvent::Frame(Some(Err(e))) => return Some(Err(read_error(e))),
                SocketEvent::Frame(Some(Ok(message))) => match message {
                    ws::Message::Text(text) => {
                        self.pending = fragment(
                            MessageKind::Text,
                            text.into_bytes(),
                            self.receive_buffer_size,
                        );
                    }
                    ws::Message::Binary(data) => {
                        self.pending =
                            fragment(MessageKind::Binary, data, self.receive_buffer_size);
                    }
                    ws::Message::Close(frame) => {
                        self.close_received = true;
                        return Some(Ok(Inbound::Close(frame.map(|f| CloseFrame {
                            code: f.code,
                            reason: f.reason.into_owned(),
                        }))));
                    }
                    // Pings are answered by axum
                    ws::Message::Ping(_) | ws::Message::Pong(_) => {}
                },
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let frame = match message.kind {
            MessageKind::Text => ws::Message::Text(
                String::from_utf8(message.data)
                    .map_err(|e| TransportError::new(format!("invalid UTF-8 in text frame: {e}")))?,
            ),
            MessageKind::Binary => ws::Message::Binary(message.data),
        };
        self.socket
            .send(frame)
            .await
            .map_err(|e| TransportError::new(e.to_string()))
    }

    async fn close(&mut self, frame: Option<CloseFrame>) -> Result<(), TransportError> {
        if self.close_received {
            // The close reply was queued when the peer's frame was read
            return SinkExt::close(&mut self.socket)
                .await
                .map_err(|e| TransportError::new(e.to_string()));
        }
        let frame = frame.map(|f| ws::CloseFrame {
            code: f.code,
            reason: f.reason.into(),
        });
        self.socket
            .send(ws::Message::Close(frame))
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        // Wait for the peer's close reply; anything else is discarded
        while let Some(message) = self.socket.recv().await {
            match message {
                Ok(ws::Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(TransportError::new(e.to_string())),
            }
        }
        Ok(())
    }
}
