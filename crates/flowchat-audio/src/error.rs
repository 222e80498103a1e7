//! Error types for flowchat-audio

use thiserror::Error;

/// Voice side channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Signaling socket error
    #[error("socket error: {0}")]
    Socket(String),

    /// Signaling socket is not connected
    #[error("socket closed")]
    SocketClosed,

    /// Signaling frame could not be parsed
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Audio payload was not valid base64
    #[error("decode error: {0}")]
    Decode(String),

    /// Media sink rejected an append
    #[error("append failed: {0}")]
    Append(String),

    /// Media sink was closed before becoming ready
    #[error("sink not ready: {0}")]
    SinkNotReady(String),

    /// Media sink did not become ready in time
    #[error("sink readiness timed out after {0} ms")]
    ReadyTimeout(u64),

    /// Microphone access refused
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Audio device error
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Audio stream error
    #[error("audio stream error: {0}")]
    AudioStream(String),

    /// No archived audio for a message
    #[error("no archived audio for message: {0}")]
    NotFound(String),

    /// Player task is no longer running
    #[error("player task stopped")]
    PlayerGone,

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Error code for logs and the CLI
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Socket(_) => "socket_error",
            Self::SocketClosed => "socket_closed",
            Self::InvalidFrame(_) => "invalid_frame",
            Self::Decode(_) => "decode_error",
            Self::Append(_) => "audio_append_failure",
            Self::SinkNotReady(_) => "sink_not_ready",
            Self::ReadyTimeout(_) => "ready_timeout",
            Self::PermissionDenied(_) => "audio_permission_denied",
            Self::AudioDevice(_) => "audio_device",
            Self::AudioStream(_) => "audio_stream",
            Self::NotFound(_) => "not_found",
            Self::PlayerGone => "player_gone",
            Self::Network(_) => "network_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::SocketClosed,
            other => Self::Socket(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<Error> for flowchat_core::Error {
    fn from(err: Error) -> Self {
        flowchat_core::Error::Voice(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
