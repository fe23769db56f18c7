//! Connection parameters and subscription settings.

use std::fmt;

use frames::AckMode;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_DESTINATION: &str = "/user/queue/alert";
pub const DEFAULT_SUBSCRIPTION_ID: &str = "MyuniqueId";

/// Websocket path exposed by the notification server (SockJS raw endpoint).
pub const WS_PATH: &str = "/notifications/websocket";

pub const ENV_TOKEN: &str = "STOMP_NOTIFY_TOKEN";
pub const ENV_HOST: &str = "STOMP_NOTIFY_HOST";
pub const ENV_PORT: &str = "STOMP_NOTIFY_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Token, host and port for one notification server. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    token: String,
    host: String,
    port: u16,
}

impl ConnectionParams {
    #[must_use]
    pub fn new(token: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            token: token.into(),
            host: host.into(),
            port,
        }
    }

    /// Build connection parameters from environment variables.
    ///
    /// Required:
    /// - `STOMP_NOTIFY_TOKEN`
    ///
    /// Optional:
    /// - `STOMP_NOTIFY_HOST`: default `127.0.0.1`
    /// - `STOMP_NOTIFY_PORT`: default `8765`
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when the token is unset and
    /// [`ConfigError::InvalidValue`] when the port is not a valid `u16`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var(ENV_TOKEN)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingVar(ENV_TOKEN))?;
        let host = std::env::var(ENV_HOST)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = match std::env::var(ENV_PORT).ok().filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { var: ENV_PORT, value: raw })?,
            None => DEFAULT_PORT,
        };

        Ok(Self { token, host, port })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `ws://<host>:<port>/notifications/websocket`
    #[must_use]
    pub fn ws_uri(&self) -> String {
        format!("ws://{}:{}{WS_PATH}", self.host, self.port)
    }

    /// Value of the HTTP `Authorization` header sent on the upgrade request.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Where the session subscribes once the websocket opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub destination: String,
    pub id: String,
    pub ack: AckMode,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            destination: DEFAULT_DESTINATION.to_owned(),
            id: DEFAULT_SUBSCRIPTION_ID.to_owned(),
            ack: AckMode::Auto,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
