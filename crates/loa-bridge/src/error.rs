use std::time::Duration;

use loa_message::Value;

/// Errors from compiling a route pattern.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    /// Patterns are absolute, like the addresses they match.
    #[error("pattern must start with '/': {0:?}")]
    NotAbsolute(String),

    /// `**` swallows the rest of the address, so nothing may follow it.
    #[error("'**' must be the last segment: {0:?}")]
    MisplacedRest(String),

    /// A `:` segment without a name.
    #[error("empty parameter name: {0:?}")]
    EmptyParam(String),
}

/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error (opening the device).
    #[error("transport error: {0}")]
    Transport(#[from] loa_transport::TransportError),

    /// Frame-level error (writing a frame).
    #[error("frame error: {0}")]
    Frame(#[from] loa_frame::FrameError),

    /// A message could not be encoded.
    #[error("message error: {0}")]
    Message(#[from] loa_message::MessageError),

    /// A route pattern is invalid.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// JSON payload could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No response within the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered with a failure outcome.
    #[error("device reported failure: {0}")]
    RequestFailed(Value),

    /// The request id was reused by a newer request before this one settled.
    #[error("request {0} superseded by a newer request with the same id")]
    Superseded(u16),

    /// The raw frame carrying the payload was dropped by the framer.
    #[error("raw payload lost: {0}")]
    RawFrameLost(String),

    /// The connection went away while the request was pending.
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// The bridge has no open connection.
    #[error("not connected")]
    NotConnected,

    /// `connect`/`attach` called on a connected bridge.
    #[error("already connected")]
    AlreadyConnected,

    /// The device answered, but not in the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
