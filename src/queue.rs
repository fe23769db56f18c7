//! Notification queue: an unbounded FIFO between the session and its consumers.
//!
//! DESIGN
//! ======
//! The queue owns both ends of an unbounded tokio channel. `put` never blocks
//! and cannot fail because the receiver lives as long as the queue itself.
//! Consumers serialize on the receiver mutex, so ordering is FIFO across all
//! of them.
//!
//! There is no backpressure: a consumer that stops draining makes the queue
//! grow without limit.

use std::time::Duration;

use frames::Frame;
use tokio::sync::{Mutex, mpsc};

/// A decoded frame handed to the application.
pub type Notification = Frame;

#[derive(Debug)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
    rx: Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl NotificationQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(rx) }
    }

    /// Append a notification.
    pub fn put(&self, notification: Notification) {
        // The receiver is owned by `self`, so the channel is never closed here.
        let _ = self.tx.send(notification);
    }

    /// Wait for the next notification.
    ///
    /// With `Some(timeout)`, returns `None` once the timeout elapses; the
    /// timeout covers waiting behind other consumers as well.
    pub async fn get(&self, timeout: Option<Duration>) -> Option<Notification> {
        let next = async { self.rx.lock().await.recv().await };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, next).await.ok().flatten(),
            None => next.await,
        }
    }

    /// Take the next notification without waiting.
    ///
    /// Returns `None` when the queue is empty or another consumer is currently
    /// waiting on it.
    pub fn try_get(&self) -> Option<Notification> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Blocking receive for consumers running on plain threads.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime.
    pub fn blocking_get(&self) -> Option<Notification> {
        self.rx.blocking_lock().blocking_recv()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
