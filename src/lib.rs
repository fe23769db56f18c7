//! STOMP-over-websocket notification client.
//!
//! ARCHITECTURE
//! ============
//! [`StompClient`] holds the connection parameters and a shared
//! [`NotificationQueue`]. `start` opens the websocket, hands it to a
//! [`Session`], and runs until the connection closes, fails, or is cancelled.
//! The session sends CONNECT + SUBSCRIBE on open and pushes every decoded
//! inbound frame onto the queue; consumers drain the queue on their own tasks.
//!
//! There is no reconnect layer. A supervisor that wants one calls `start`
//! again; the queue survives across calls.

pub mod client;
pub mod config;
pub mod queue;
pub mod session;

pub use client::{ClientError, StompClient};
pub use config::{ConfigError, ConnectionParams, Subscription};
pub use frames::{AckMode, Command, Frame};
pub use queue::{Notification, NotificationQueue};
pub use session::{Session, SessionError, SessionState, SessionSummary};
pub use tokio_util::sync::CancellationToken;
