//! Client facade holding the connection parameters and the notification queue.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    handshake::client::Request,
    http::{HeaderValue, header::AUTHORIZATION, header::InvalidHeaderValue},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{ConfigError, ConnectionParams, Subscription};
use crate::queue::NotificationQueue;
use crate::session::{Session, SessionError, SessionSummary};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid websocket uri: {0}")]
    InvalidUri(Box<tungstenite::Error>),
    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct StompClient {
    params: ConnectionParams,
    subscription: Subscription,
    notifications: Arc<NotificationQueue>,
}

impl StompClient {
    #[must_use]
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            subscription: Subscription::default(),
            notifications: Arc::new(NotificationQueue::new()),
        }
    }

    /// Build a client from `STOMP_NOTIFY_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`ConnectionParams::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(ConnectionParams::from_env()?))
    }

    /// Override the destination, subscription id, or ack mode.
    #[must_use]
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = subscription;
        self
    }

    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// The queue every decoded frame lands on. Shared across `start` calls.
    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationQueue> {
        Arc::clone(&self.notifications)
    }

    /// Websocket upgrade request carrying `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUri`] when host/port do not form a valid
    /// URI and [`ClientError::InvalidHeader`] when the token is not a legal
    /// header value.
    pub fn connect_request(&self) -> Result<Request, ClientError> {
        let mut request = self
            .params
            .ws_uri()
            .into_client_request()
            .map_err(|e| ClientError::InvalidUri(Box::new(e)))?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&self.params.authorization())?);
        Ok(request)
    }

    /// Connect and run the session until the connection closes.
    ///
    /// Long-lived: run it on its own task. Calling it again after it returns
    /// opens a fresh connection feeding the same queue.
    ///
    /// # Errors
    ///
    /// Fails when the upgrade request cannot be built, the handshake fails,
    /// or the session ends on a transport error.
    pub async fn start(&self) -> Result<SessionSummary, ClientError> {
        self.start_with_cancel(CancellationToken::new()).await
    }

    /// Like [`StompClient::start`], but returns once `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`StompClient::start`].
    pub async fn start_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, ClientError> {
        let request = self.connect_request()?;
        let mut session = Session::new(self.subscription.clone(), self.notifications());

        let uri = self.params.ws_uri();
        info!(%uri, "stomp: connecting");

        let (stream, response) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(%uri, "stomp: connect cancelled");
                session.on_close(None);
                return Ok(session.summary());
            }
            result = connect_async(request) => result.map_err(|e| {
                error!(%uri, error = %e, "stomp: websocket connect failed");
                ClientError::Connect(Box::new(e))
            })?,
        };
        info!(%uri, status = %response.status(), "stomp: websocket open");

        let (writer, reader) = stream.split();
        let summary = session.run(reader, writer, cancel).await?;
        info!(
            %uri,
            enqueued = summary.enqueued,
            dropped = summary.dropped,
            "stomp: session finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
