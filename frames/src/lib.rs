//! STOMP frame model and text codec for the notification websocket.
//!
//! This crate owns the wire representation used by the client session: a
//! command line, `name:value` header lines, a blank line, the body, and a NUL
//! terminator. Only CONNECT and SUBSCRIBE are ever produced by the client;
//! any STOMP 1.2 command can be decoded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocol versions advertised in the CONNECT frame.
pub const ACCEPT_VERSION: &str = "1.0,1.1,2.0";

/// Frame terminator.
pub const NUL: char = '\0';

/// Error returned by [`decode_frame`] and the [`FromStr`] impls in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input held nothing but end-of-line characters (a heartbeat).
    #[error("frame is empty")]
    Empty,
    /// The command line does not name a STOMP command.
    #[error("unknown frame command: {0:?}")]
    UnknownCommand(String),
    /// A header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// The header block is not closed by a blank line.
    #[error("missing blank line between headers and body")]
    MissingSeparator,
    /// No NUL byte terminates the frame.
    #[error("missing NUL terminator")]
    MissingTerminator,
    /// Something other than end-of-line characters follows the NUL byte.
    #[error("unexpected data after NUL terminator")]
    TrailingData,
    /// A header contains a backslash escape STOMP does not define.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),
    /// The `content-length` header is not a byte count.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),
    /// Unrecognised acknowledgment mode.
    #[error("unknown ack mode: {0:?}")]
    UnknownAckMode(String),
}

/// STOMP 1.2 frame commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    // Client frames.
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames.
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED carry their headers verbatim; every other frame
    /// uses backslash escapes.
    #[must_use]
    pub fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "ACK" => Ok(Self::Ack),
            "NACK" => Ok(Self::Nack),
            "BEGIN" => Ok(Self::Begin),
            "COMMIT" => Ok(Self::Commit),
            "ABORT" => Ok(Self::Abort),
            "DISCONNECT" => Ok(Self::Disconnect),
            "CONNECTED" => Ok(Self::Connected),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(CodecError::UnknownCommand(other.to_owned())),
        }
    }
}

/// Acknowledgment policy requested in a SUBSCRIBE frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// The broker considers a message acknowledged once sent.
    #[default]
    Auto,
    /// Cumulative client acknowledgment.
    Client,
    /// Per-message client acknowledgment.
    ClientIndividual,
}

impl AckMode {
    /// Header value for the `ack` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Client => "client",
            Self::ClientIndividual => "client-individual",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckMode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "client" => Ok(Self::Client),
            "client-individual" => Ok(Self::ClientIndividual),
            other => Err(CodecError::UnknownAckMode(other.to_owned())),
        }
    }
}

/// A single STOMP frame.
///
/// Headers keep wire order so encoding is deterministic. Lookups go through
/// [`Frame::header`], which returns the first occurrence of a name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Header name/value pairs in wire order.
    pub headers: Vec<(String, String)>,
    /// Frame body, possibly empty.
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header called `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Encode the CONNECT frame sent right after the websocket opens.
///
/// No login headers are included; authentication rides on the HTTP upgrade.
#[must_use]
pub fn encode_connect() -> String {
    encode_frame(&Frame::new(Command::Connect).with_header("accept-version", ACCEPT_VERSION))
}

/// Encode a SUBSCRIBE frame with `destination`, `id` and `ack` headers, in that order.
#[must_use]
pub fn encode_subscribe(destination: &str, subscription_id: &str, ack: AckMode) -> String {
    encode_frame(
        &Frame::new(Command::Subscribe)
            .with_header("destination", destination)
            .with_header("id", subscription_id)
            .with_header("ack", ack.as_str()),
    )
}

/// Encode a frame into its wire text, NUL terminator included.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    let escape = frame.command.escapes_headers();
    let mut out = String::with_capacity(64 + frame.body.len());

    out.push_str(frame.command.as_str());
    out.push('\n');
    for (name, value) in &frame.headers {
        if escape {
            push_escaped(&mut out, name);
            out.push(':');
            push_escaped(&mut out, value);
        } else {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&frame.body);
    out.push(NUL);
    out
}

/// Decode one wire frame.
///
/// Leading end-of-line characters are skipped, lines may end in `\n` or
/// `\r\n`, and only end-of-line characters may follow the NUL terminator.
/// When a `content-length` header is present the body is read by byte count,
/// so it may itself contain NUL.
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first structural problem found.
pub fn decode_frame(raw: &str) -> Result<Frame, CodecError> {
    let raw = raw.trim_start_matches(is_eol);
    if raw.is_empty() {
        return Err(CodecError::Empty);
    }

    let unterminated = !raw.contains(NUL);
    let incomplete = || {
        if unterminated {
            CodecError::MissingTerminator
        } else {
            CodecError::MissingSeparator
        }
    };

    let mut cursor = raw;
    let command_line = next_line(&mut cursor).ok_or_else(incomplete)?;
    let command = command_line.parse::<Command>()?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = next_line(&mut cursor).ok_or_else(incomplete)?;
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(CodecError::MalformedHeader(line.to_owned()));
        };
        if escape {
            headers.push((unescape(name)?, unescape(value)?));
        } else {
            headers.push((name.to_owned(), value.to_owned()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| CodecError::InvalidContentLength(value.clone()))
        })
        .transpose()?;

    let (body, trailing) = match content_length {
        Some(len) => {
            let body = cursor.get(..len).ok_or(CodecError::MissingTerminator)?;
            let rest = &cursor[len..];
            let trailing = rest.strip_prefix(NUL).ok_or(CodecError::MissingTerminator)?;
            (body, trailing)
        }
        None => cursor
            .split_once(NUL)
            .ok_or(CodecError::MissingTerminator)?,
    };

    if !trailing.chars().all(is_eol) {
        return Err(CodecError::TrailingData);
    }

    Ok(Frame {
        command,
        headers,
        body: body.to_owned(),
    })
}

fn is_eol(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Pop one line off `cursor`, dropping the `\n` and an optional preceding `\r`.
fn next_line<'a>(cursor: &mut &'a str) -> Option<&'a str> {
    let (line, rest) = cursor.split_once('\n')?;
    *cursor = rest;
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn push_escaped(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, CodecError> {
    if !raw.contains('\\') {
        return Ok(raw.to_owned());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(CodecError::InvalidEscape(raw.to_owned())),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
