//! Error types for flowchat-core
//!
//! This module provides the error taxonomy of the chat engine: decoding,
//! stream I/O, pluggable handler and transcript persistence failures.

use thiserror::Error;

/// Chat engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// A transport chunk failed JSON decoding
    #[error("malformed chunk: {reason}")]
    MalformedChunk {
        /// Raw chunk text as received
        raw: String,
        /// Parser message
        reason: String,
    },

    /// The underlying byte stream read failed
    #[error("stream read failed: {0}")]
    StreamRead(String),

    /// The request collaborator could not open a response stream
    #[error("request failed: {0}")]
    Request(String),

    /// A pluggable event handler failed
    #[error("event handler failed: {0}")]
    Handler(String),

    /// No regenerable assistant message at this index
    #[error("invalid message index: {0}")]
    InvalidIndex(usize),

    /// Submitted prompt was empty
    #[error("prompt is empty")]
    EmptyPrompt,

    /// Voice side channel error
    #[error("voice channel error: {0}")]
    Voice(String),

    /// Transcript mirror error
    #[error("mirror error: {0}")]
    Mirror(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a malformed chunk error
    #[must_use]
    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedChunk {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream read error
    #[must_use]
    pub fn stream_read(msg: impl Into<String>) -> Self {
        Self::StreamRead(msg.into())
    }

    /// Create a handler error
    #[must_use]
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Create a voice channel error
    #[must_use]
    pub fn voice(msg: impl Into<String>) -> Self {
        Self::Voice(msg.into())
    }

    /// Check if the current turn can continue after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedChunk { .. } | Self::Handler(_) | Self::Voice(_) | Self::Mirror(_)
        )
    }

    /// Get a stable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedChunk { .. } => "malformed_chunk",
            Self::StreamRead(_) => "stream_read_failure",
            Self::Request(_) => "request_failure",
            Self::Handler(_) => "custom_handler_failure",
            Self::InvalidIndex(_) => "invalid_index",
            Self::EmptyPrompt => "empty_prompt",
            Self::Voice(_) => "voice_error",
            Self::Mirror(_) => "mirror_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Result type alias for chat engine operations
pub type Result<T> = std::result::Result<T, Error>;
