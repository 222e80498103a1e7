//! Audio signaling protocol
//!
//! JSON text frames exchanged over the signaling socket. Outbound frames carry
//! answer text to the remote speech renderer; inbound `_data_` frames carry
//! base64-encoded audio.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A signaling frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalFrame {
    /// A message starts
    #[serde(rename = "_start_")]
    Start {
        /// Message the audio belongs to
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Payload for a message (text outbound, base64 audio inbound)
    #[serde(rename = "_data_")]
    Data {
        /// Message the payload belongs to
        #[serde(rename = "messageId")]
        message_id: String,
        /// Payload
        #[serde(default)]
        content: String,
    },

    /// A message ends
    #[serde(rename = "_end_")]
    End {
        /// Message that ended
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Remote error report
    #[serde(rename = "_error_")]
    Error {
        /// Message the error relates to, if any
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        /// Error text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

impl SignalFrame {
    /// `_start_` frame
    pub fn start(message_id: impl Into<String>) -> Self {
        Self::Start {
            message_id: message_id.into(),
        }
    }

    /// `_data_` frame
    pub fn data(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Data {
            message_id: message_id.into(),
            content: content.into(),
        }
    }

    /// `_end_` frame
    pub fn end(message_id: impl Into<String>) -> Self {
        Self::End {
            message_id: message_id.into(),
        }
    }

    /// Message id carried by the frame
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Start { message_id } | Self::Data { message_id, .. } | Self::End { message_id } => {
                Some(message_id)
            }
            Self::Error { message_id, .. } => message_id.as_deref(),
        }
    }

    /// Wire type tag
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "_start_",
            Self::Data { .. } => "_data_",
            Self::End { .. } => "_end_",
            Self::Error { .. } => "_error_",
        }
    }

    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidFrame(e.to_string()))
    }

    /// Serialize to a text frame
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidFrame(e.to_string()))
    }
}
