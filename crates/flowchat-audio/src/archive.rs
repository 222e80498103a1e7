//! Per-message audio archive
//!
//! Keeps the base64 chunks received for each message so a finished answer can
//! be replayed without asking the server again. Retention is unbounded unless
//! a limit is configured, in which case the oldest finished messages go first.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Entry {
    chunks: Vec<String>,
    finished: bool,
}

/// Archive of received audio, keyed by message id
#[derive(Debug, Default)]
pub struct VoiceArchive {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
    limit: Option<usize>,
}

impl VoiceArchive {
    /// Unbounded archive
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive holding at most `limit` messages
    #[must_use]
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Start a message over with no chunks
    pub fn reset(&mut self, message_id: &str) {
        self.order.retain(|id| id != message_id);
        self.order.push_back(message_id.to_string());
        self.entries.insert(message_id.to_string(), Entry::default());
        self.evict(Some(message_id));
    }

    /// Append a base64 chunk
    pub fn append(&mut self, message_id: &str, chunk: impl Into<String>) {
        if !self.entries.contains_key(message_id) {
            self.order.push_back(message_id.to_string());
        }
        self.entries
            .entry(message_id.to_string())
            .or_default()
            .chunks
            .push(chunk.into());
    }

    /// Mark a message as complete; `protected` is never evicted
    pub fn finish(&mut self, message_id: &str, protected: Option<&str>) {
        if let Some(entry) = self.entries.get_mut(message_id) {
            entry.finished = true;
        }
        self.evict(protected);
    }

    /// Archived chunks of a message
    #[must_use]
    pub fn chunks(&self, message_id: &str) -> Option<&[String]> {
        self.entries.get(message_id).map(|e| e.chunks.as_slice())
    }

    /// Whether a message has archived audio
    #[must_use]
    pub fn contains(&self, message_id: &str) -> bool {
        self.entries
            .get(message_id)
            .is_some_and(|e| !e.chunks.is_empty())
    }

    /// Number of archived messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode every chunk separately and concatenate the bytes
    pub fn decode(&self, message_id: &str) -> Result<Vec<u8>> {
        let chunks = self
            .chunks(message_id)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::NotFound(message_id.to_string()))?;

        let mut buffer = Vec::new();
        for chunk in chunks {
            buffer.extend(STANDARD.decode(chunk)?);
        }
        Ok(buffer)
    }

    fn evict(&mut self, protected: Option<&str>) {
        let Some(limit) = self.limit else {
            return;
        };

        while self.entries.len() > limit {
            let victim = self.order.iter().position(|id| {
                Some(id.as_str()) != protected
                    && self.entries.get(id).is_some_and(|e| e.finished)
            });
            let Some(position) = victim else {
                break;
            };
            if let Some(id) = self.order.remove(position) {
                self.entries.remove(&id);
                debug!(message_id = %id, "Archived audio evicted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_decode() {
        let mut archive = VoiceArchive::new();
        archive.reset("s1");
        archive.append("s1", "QQ==");
        archive.append("s1", "Qg==");
        assert_eq!(archive.chunks("s1").unwrap(), ["QQ==", "Qg=="]);
        assert_eq!(archive.decode("s1").unwrap(), b"AB");
    }

    #[test]
    fn test_reset_clears_previous_chunks() {
        let mut archive = VoiceArchive::new();
        archive.append("s1", "QQ==");
        archive.reset("s1");
        assert!(archive.chunks("s1").unwrap().is_empty());
        assert!(!archive.contains("s1"));
    }

    #[test]
    fn test_decode_missing_or_invalid() {
        let mut archive = VoiceArchive::new();
        assert!(matches!(archive.decode("none"), Err(Error::NotFound(_))));

        archive.append("bad", "@@@");
        assert!(matches!(archive.decode("bad"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut archive = VoiceArchive::new();
        for i in 0..100 {
            let id = format!("m{i}");
            archive.reset(&id);
            archive.finish(&id, None);
        }
        assert_eq!(archive.len(), 100);
    }

    #[test]
    fn test_limit_evicts_oldest_finished_not_selected() {
        let mut archive = VoiceArchive::with_limit(Some(2));
        archive.reset("a");
        archive.append("a", "QQ==");
        // "a" is still playing, nothing finished yet
        archive.reset("b");
        archive.reset("c");
        assert_eq!(archive.len(), 3);

        archive.finish("b", Some("a"));
        assert!(archive.contains("a"));
        assert!(archive.chunks("b").is_none());
        assert_eq!(archive.len(), 2);

        archive.finish("a", Some("a"));
        assert!(archive.contains("a"));
    }
}
