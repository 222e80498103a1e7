//! Local transcript mirror
//!
//! Unauthenticated ("local") sessions keep a copy of the transcript on disk so
//! it survives restarts. The whole transcript is rewritten on every change.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::ChatMessage;

/// Persisted-session writer
pub trait TranscriptMirror: Send + Sync {
    /// Replace the stored transcript
    fn save(&self, messages: &[ChatMessage]) -> Result<()>;

    /// Read the stored transcript (empty if none)
    fn load(&self) -> Result<Vec<ChatMessage>>;

    /// Remove the stored transcript
    fn clear(&self) -> Result<()>;
}

/// Mirror stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileMirror {
    path: PathBuf,
}

impl JsonFileMirror {
    /// Create a mirror at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `~/.flowchat/local_chats.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowchat")
            .join("local_chats.json")
    }

    /// File path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranscriptMirror for JsonFileMirror {
    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(messages)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::Mirror(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), count = messages.len(), "Transcript mirrored");
        Ok(())
    }

    fn load(&self) -> Result<Vec<ChatMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
