//! Chat message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::thought_chain::ThoughtChain;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user
    User,
    /// Assistant response
    Assistant,
}

/// One message of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-side id
    pub id: String,
    /// Author
    pub role: Role,
    /// Visible text
    pub content: String,
    /// Attached file URLs
    #[serde(default)]
    pub files: Vec<String>,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Still waiting for the first visible output
    #[serde(default)]
    pub loading: bool,
    /// Reasoning and tool-call side panel
    #[serde(default)]
    pub thought_chain: ThoughtChain,
    /// Server-side message session id
    #[serde(default)]
    pub session_ref: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            files: Vec::new(),
            created: now,
            updated_at: now,
            loading: false,
            thought_chain: ThoughtChain::new(),
            session_ref: None,
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an empty assistant placeholder waiting for output
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        let mut message = Self::with_role(Role::Assistant, "");
        message.loading = true;
        message
    }

    /// Attach files
    #[must_use]
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    /// Whether this is an assistant message
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_loading() {
        let msg = ChatMessage::assistant_placeholder();
        assert!(msg.loading);
        assert!(msg.is_assistant());
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_serializes_camel_case() {
        let msg = ChatMessage::user("hi").with_files(vec!["a.png".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("thoughtChain").unwrap().is_array());
        assert_eq!(json["files"][0], "a.png");
    }
}
