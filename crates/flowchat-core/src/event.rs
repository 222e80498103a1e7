//! Stream event types
//!
//! A [`StreamEvent`] is one decoded unit of the streaming response. Events are
//! ephemeral: the accumulator consumes them as soon as they are decoded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical category of a streamed unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Visible answer text
    Content,
    /// Model reasoning
    Thinking,
    /// Agent thought step
    Thought,
    /// A tool is being invoked
    ToolCalling,
    /// A tool invocation returned
    CallResult,
    /// Any other server-defined kind
    Other(String),
}

impl EventKind {
    /// Wire name of this kind
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content => "content",
            Self::Thinking => "thinking",
            Self::Thought => "thought",
            Self::ToolCalling => "toolCalling",
            Self::CallResult => "callResult",
            Self::Other(name) => name,
        }
    }

    /// Whether this kind is rendered in the thought chain panel
    #[must_use]
    pub fn is_thought_chain(&self) -> bool {
        matches!(
            self,
            Self::Thinking | Self::Thought | Self::ToolCalling | Self::CallResult
        )
    }

    /// Whether this kind carries the visible answer text
    #[must_use]
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content)
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "content" => Self::Content,
            "thinking" => Self::Thinking,
            "thought" => Self::Thought,
            "toolCalling" => Self::ToolCalling,
            "callResult" => Self::CallResult,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response lifecycle marker carried in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamStatus {
    /// First frame of a response
    Start,
    /// Last frame of a response (not always sent)
    End,
}

/// Metadata attached to a streamed unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataMap {
    /// Event id used to key thought chain entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Title of the thought chain entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_title: Option<String>,
    /// Server-side message session id (archive key for voice replay)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_session_id: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Decoded `data` object of a transport envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Lifecycle marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StreamStatus>,
    /// Text delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Message id assigned by the server (voice channel key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Event id (takes precedence over `metadataMap.id`)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_id")]
    pub id: Option<String>,
}

/// Ids arrive as strings or numbers depending on the server build
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// One decoded unit of the wire stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Logical kind (absent `event` field means `content`)
    pub kind: EventKind,
    /// Decoded payload
    pub payload: EventPayload,
    /// Metadata map
    pub metadata: MetadataMap,
}

impl StreamEvent {
    /// Create an event with the given kind and content
    #[must_use]
    pub fn new(kind: impl Into<EventKind>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: EventPayload {
                content: Some(content.into()),
                ..Default::default()
            },
            metadata: MetadataMap::default(),
        }
    }

    /// Set the metadata id
    #[must_use]
    pub fn with_metadata_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.id = Some(id.into());
        self
    }

    /// Set the chain title
    #[must_use]
    pub fn with_chain_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.chain_title = Some(title.into());
        self
    }

    /// Text delta, empty if absent
    #[must_use]
    pub fn content(&self) -> &str {
        self.payload.content.as_deref().unwrap_or("")
    }

    /// Id used to key thought chain entries: payload id, then metadata id
    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        self.payload
            .id
            .as_deref()
            .or(self.metadata.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        assert_eq!(EventKind::from("toolCalling"), EventKind::ToolCalling);
        assert_eq!(EventKind::from("messageSessionId").as_str(), "messageSessionId");
        assert!(EventKind::CallResult.is_thought_chain());
        assert!(!EventKind::Content.is_thought_chain());
    }

    #[test]
    fn test_event_id_precedence() {
        let mut event = StreamEvent::new("thought", "x").with_metadata_id("meta");
        assert_eq!(event.event_id(), Some("meta"));

        event.payload.id = Some("own".to_string());
        assert_eq!(event.event_id(), Some("own"));
    }

    #[test]
    fn test_numeric_payload_id() {
        let payload: EventPayload = serde_json::from_str(r#"{"id": 42, "content": "a"}"#).unwrap();
        assert_eq!(payload.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_metadata_keeps_unknown_fields() {
        let meta: MetadataMap =
            serde_json::from_str(r#"{"chainTitle": "Search", "toolName": "web"}"#).unwrap();
        assert_eq!(meta.chain_title.as_deref(), Some("Search"));
        assert!(meta.extra.contains_key("toolName"));
    }
}
