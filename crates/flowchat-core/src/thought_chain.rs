//! Thought chain store
//!
//! Every assistant message owns an ordered list of auxiliary reasoning and
//! tool-call entries keyed by the server-issued event id. A repeated id
//! updates its entry in place (last write wins); a new id appends.

use serde::{Deserialize, Serialize};

/// Progress of a thought chain entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    /// Still receiving content
    #[default]
    Pending,
    /// Its event kind has completed
    Done,
}

/// One entry of a thought chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtChainItem {
    /// Server-issued event id
    pub key: String,
    /// Display title
    pub title: String,
    /// Accumulated content (markdown)
    pub content: String,
    /// Entry status
    pub status: ThoughtStatus,
}

/// Ordered thought chain of one message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtChain {
    items: Vec<ThoughtChainItem>,
}

impl ThoughtChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the entry for `key`
    ///
    /// Returns `true` when a new entry was appended.
    pub fn upsert(&mut self, key: &str, title: Option<&str>, content: &str) -> bool {
        if let Some(item) = self.items.iter_mut().find(|item| item.key == key) {
            if let Some(title) = title {
                item.title = title.to_string();
            }
            item.content = content.to_string();
            item.status = ThoughtStatus::Pending;
            return false;
        }

        self.items.push(ThoughtChainItem {
            key: key.to_string(),
            title: title.unwrap_or_default().to_string(),
            content: content.to_string(),
            status: ThoughtStatus::Pending,
        });
        true
    }

    /// Mark the entry for `key` as done
    pub fn mark_done(&mut self, key: &str) -> bool {
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => {
                item.status = ThoughtStatus::Done;
                true
            }
            None => false,
        }
    }

    /// Look up an entry
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ThoughtChainItem> {
        self.items.iter().find(|item| item.key == key)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ThoughtChainItem> {
        self.items.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the chain has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
