//! Pluggable event handlers
//!
//! An [`EventHandler`] may intercept the progress and completion of any event
//! kind before the session's default processing runs. Returning
//! `handled = true` skips the default; an error is logged and treated as if
//! the handler had declined.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::event::{EventKind, MetadataMap, StreamEvent, StreamStatus};
use crate::transcript::Transcript;

/// Data passed to handlers for one transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Delta of this chunk, or the final content on completion
    pub content: String,
    /// Everything accumulated for the kind so far
    pub accumulated_content: String,
    /// Whether this is the completion of the kind
    pub is_complete: bool,
    /// Event id (payload id, falling back to metadata id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Server message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Lifecycle marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StreamStatus>,
    /// Metadata map of the chunk (empty on completion)
    pub metadata_map: MetadataMap,
    /// Ids seen during the run (completion only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_ids: Vec<String>,
}

impl EventData {
    /// Build progress data from a chunk
    #[must_use]
    pub fn progress(event: &StreamEvent, accumulated: &str) -> Self {
        Self {
            content: event.content().to_string(),
            accumulated_content: accumulated.to_string(),
            is_complete: false,
            id: event.event_id().map(str::to_string),
            message_id: event.payload.message_id.clone(),
            status: event.payload.status,
            metadata_map: event.metadata.clone(),
            event_ids: Vec::new(),
        }
    }

    /// Build completion data
    #[must_use]
    pub fn complete(accumulated: &str, event_ids: &[String]) -> Self {
        Self {
            content: accumulated.to_string(),
            accumulated_content: accumulated.to_string(),
            is_complete: true,
            id: None,
            message_id: None,
            status: None,
            metadata_map: MetadataMap::default(),
            event_ids: event_ids.to_vec(),
        }
    }
}

/// Result of a handler invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    /// Whether default processing should be skipped
    pub handled: bool,
    /// Optional handler result
    pub data: Option<serde_json::Value>,
}

impl HandlerOutcome {
    /// Handler took care of the event
    #[must_use]
    pub fn handled() -> Self {
        Self {
            handled: true,
            data: None,
        }
    }

    /// Handler took care of the event and produced a result
    #[must_use]
    pub fn handled_with(data: serde_json::Value) -> Self {
        Self {
            handled: true,
            data: Some(data),
        }
    }

    /// Handler passes, default processing runs
    #[must_use]
    pub fn declined() -> Self {
        Self::default()
    }
}

/// Mutable view of the session given to handlers
pub struct SessionView<'a> {
    /// Conversation buffer of the session
    pub transcript: &'a mut Transcript,
}

/// Strategy interface for intercepting event kinds
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every chunk of an active kind
    async fn on_progress(
        &self,
        _kind: &EventKind,
        _data: &EventData,
        _view: &mut SessionView<'_>,
    ) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::declined())
    }

    /// Called once when a kind ends
    async fn on_complete(
        &self,
        _kind: &EventKind,
        _data: &EventData,
        _view: &mut SessionView<'_>,
    ) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::declined())
    }
}
