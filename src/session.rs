//! Connection session: one websocket carrying one STOMP subscription.
//!
//! LIFECYCLE
//! =========
//! 1. `Connecting`: the websocket handshake is in flight (driven by `client`).
//! 2. Open → send CONNECT then SUBSCRIBE → `Subscribed`. The CONNECTED reply
//!    is not awaited; it arrives as an ordinary inbound frame.
//! 3. `Subscribed`: every inbound message is decoded and enqueued. Frames that
//!    fail to decode are logged and dropped; the session keeps running.
//! 4. Peer close, local cancel, or end of stream → `Closed`. A transport
//!    error → `Errored`. Both are terminal; nothing here reconnects.
//!
//! The session only sees a `Stream` of inbound messages and a `Sink` for
//! outbound ones, so the same code runs over a real socket or an in-memory
//! test transport.

use std::fmt;
use std::sync::Arc;

use frames::{CodecError, Command};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message, protocol::CloseFrame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::Subscription;
use crate::queue::NotificationQueue;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Subscribed,
    Closed,
    Errored,
}

impl SessionState {
    /// Terminal states never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// Failure that ends a session as `Errored`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket transport failed: {0}")]
    Transport(Box<tungstenite::Error>),
}

/// Final accounting for one session run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Terminal state the session ended in.
    pub state: SessionState,
    /// Frames decoded and pushed onto the queue.
    pub enqueued: u64,
    /// Inbound messages that could not be decoded.
    pub dropped: u64,
}

/// One STOMP subscription over one websocket, feeding a shared queue.
pub struct Session {
    subscription: Subscription,
    queue: Arc<NotificationQueue>,
    state: SessionState,
    enqueued: u64,
    dropped: u64,
}

impl Session {
    #[must_use]
    pub fn new(subscription: Subscription, queue: Arc<NotificationQueue>) -> Self {
        Self {
            subscription,
            queue,
            state: SessionState::Connecting,
            enqueued: 0,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            enqueued: self.enqueued,
            dropped: self.dropped,
        }
    }

    /// Drive the session over an opened websocket until it reaches a terminal state.
    ///
    /// Returns the summary when the connection closes (by the peer, at end of
    /// stream, or because `cancel` fired).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] when the handshake frames cannot be
    /// written and [`SessionError::Transport`] when reading from the socket
    /// fails. The session is `Errored` in both cases.
    pub async fn run<R, W>(
        mut self,
        mut reader: R,
        mut writer: W,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, SessionError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
        W: Sink<Message> + Unpin,
        W::Error: fmt::Display,
    {
        self.on_open(&mut writer).await?;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("stomp: session cancelled");
                    // Best effort; the peer may already be gone.
                    let _ = writer.send(Message::Close(None)).await;
                    self.on_close(None);
                    break;
                }
                next = reader.next() => match next {
                    Some(Ok(Message::Text(text))) => self.on_message(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.on_message(text),
                        Err(e) => {
                            warn!(error = %e, len = bytes.len(), "stomp: dropping non-utf8 binary message");
                            self.dropped += 1;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        // Flushes the Close reply tungstenite queued for the peer.
                        let _ = writer.close().await;
                        self.on_close(frame.as_ref());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.on_error(&e);
                        return Err(SessionError::Transport(Box::new(e)));
                    }
                    None => {
                        self.on_close(None);
                        break;
                    }
                },
            }
        }

        Ok(self.summary())
    }

    /// Send CONNECT then SUBSCRIBE and move to `Subscribed`.
    async fn on_open<W>(&mut self, writer: &mut W) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: fmt::Display,
    {
        let subscribe = frames::encode_subscribe(
            &self.subscription.destination,
            &self.subscription.id,
            self.subscription.ack,
        );

        for payload in [frames::encode_connect(), subscribe] {
            if let Err(e) = writer.send(Message::text(payload)).await {
                error!(error = %e, "stomp: handshake send failed");
                self.state = SessionState::Errored;
                return Err(SessionError::Send(e.to_string()));
            }
        }

        self.state = SessionState::Subscribed;
        info!(
            destination = %self.subscription.destination,
            id = %self.subscription.id,
            ack = %self.subscription.ack,
            "stomp: subscribed"
        );
        Ok(())
    }

    /// Decode one inbound message and enqueue it; undecodable frames are dropped.
    fn on_message(&mut self, raw: &str) {
        if self.state.is_terminal() {
            return;
        }

        let frame = match frames::decode_frame(raw) {
            Ok(frame) => frame,
            Err(CodecError::Empty) => {
                trace!("stomp: heartbeat");
                return;
            }
            Err(e) => {
                warn!(error = %e, len = raw.len(), "stomp: dropping malformed frame");
                self.dropped += 1;
                return;
            }
        };

        match frame.command {
            Command::Connected => {
                info!(version = frame.header("version").unwrap_or("1.0"), "stomp: connected");
            }
            Command::Error => {
                warn!(server_message = frame.header("message").unwrap_or(""), "stomp: server error frame");
            }
            _ => {
                debug!(
                    command = %frame.command,
                    destination = frame.header("destination").unwrap_or(""),
                    "stomp: received frame"
                );
            }
        }

        self.queue.put(frame);
        self.enqueued += 1;
    }

    fn on_error(&mut self, err: &tungstenite::Error) {
        error!(error = %err, enqueued = self.enqueued, dropped = self.dropped, "stomp: transport error");
        self.state = SessionState::Errored;
    }

    pub(crate) fn on_close(&mut self, frame: Option<&CloseFrame>) {
        match frame {
            Some(frame) => info!(
                code = u16::from(frame.code),
                reason = frame.reason.as_str(),
                "stomp: websocket connection closed"
            ),
            None => info!("stomp: websocket connection closed"),
        }
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
