//! Error types
//!
//! Transport, media and message errors are kept apart so the call
//! coordinator can map each one to the right end reason. [`MediaError`]
//! stays on the [`MediaEngine`](crate::call::MediaEngine) boundary; the
//! crate-level [`Error`] covers the signaling side.

use std::fmt;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Signaling transport failed
    Transport(TransportError),
    /// A signaling frame could not be encoded or decoded
    Message(MessageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Message(e) => write!(f, "message error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            Error::Message(e) => Some(e),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<MessageError> for Error {
    fn from(e: MessageError) -> Self {
        Error::Message(e)
    }
}

/// Signaling transport errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection to the relay could not be established
    Connect(String),
    /// Established connection dropped or failed mid-stream
    Io(String),
    /// Channel was already opened, or a single-use connector was consumed
    AlreadyConnected,
    /// Channel is not open
    NotOpen,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "connect failed: {}", msg),
            TransportError::Io(msg) => write!(f, "connection failed: {}", msg),
            TransportError::AlreadyConnected => write!(f, "already connected"),
            TransportError::NotOpen => write!(f, "channel is not open"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Media engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Camera/microphone access was denied or unavailable
    AcquireDenied(String),
    /// Session description was malformed or rejected
    InvalidDescription(String),
    /// ICE candidate could not be applied
    Candidate(String),
    /// Operation requires state the engine is not in
    InvalidState(&'static str),
    /// Engine-specific failure
    Engine(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::AcquireDenied(msg) => write!(f, "media acquisition denied: {}", msg),
            MediaError::InvalidDescription(msg) => {
                write!(f, "invalid session description: {}", msg)
            }
            MediaError::Candidate(msg) => write!(f, "ICE candidate rejected: {}", msg),
            MediaError::InvalidState(what) => write!(f, "invalid media state: {}", what),
            MediaError::Engine(msg) => write!(f, "media engine failure: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

/// Signaling message codec errors
#[derive(Debug)]
pub enum MessageError {
    /// Frame is not valid JSON or not a known message shape
    Decode(serde_json::Error),
    /// Message could not be serialized
    Encode(serde_json::Error),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Decode(e) => write!(f, "malformed frame: {}", e),
            MessageError::Encode(e) => write!(f, "cannot encode message: {}", e),
        }
    }
}

impl std::error::Error for MessageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MessageError::Decode(e) | MessageError::Encode(e) => Some(e),
        }
    }
}
