//! Client configuration types

use flowchat_audio::AudioConfig;
use flowchat_core::{JsonFileMirror, RequestConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat endpoint and credentials
    #[serde(default)]
    pub server: RequestConfig,
    /// Typewriter pace, voice forwarding and malformed chunk policies
    #[serde(default)]
    pub session: SessionConfig,
    /// Voice side channel
    #[serde(default)]
    pub audio: AudioConfig,
    /// Local transcript mirror
    #[serde(default)]
    pub mirror: MirrorConfig,
}

/// Local transcript mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Keep a copy of the transcript on disk
    #[serde(default = "default_mirror_enabled")]
    pub enabled: bool,
    /// Mirror file (defaults to `~/.flowchat/local_chats.json`)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_mirror_enabled() -> bool {
    true
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: default_mirror_enabled(),
            path: None,
        }
    }
}

impl MirrorConfig {
    /// Effective mirror file
    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(JsonFileMirror::default_path)
    }
}
