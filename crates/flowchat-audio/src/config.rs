//! Voice side channel configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Websocket endpoint (scheme, host, port)
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,

    /// Signaling path on the endpoint
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Readiness poll interval (ms) for sinks without a ready signal
    #[serde(default = "default_ready_poll_interval")]
    pub ready_poll_interval_ms: u64,

    /// Upper bound (ms) on waiting for a sink to become ready
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,

    /// Maximum number of archived messages; unbounded when unset
    #[serde(default)]
    pub archive_limit: Option<usize>,

    /// MIME type of streamed audio
    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Speech-to-text upload path (relative to the HTTP base URL)
    #[serde(default = "default_voice_input_path")]
    pub voice_input_path: String,

    /// Sample rate for microphone capture
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum recording duration (seconds)
    #[serde(default = "default_max_record_secs")]
    pub max_record_secs: u64,
}

fn default_ws_endpoint() -> String {
    "ws://localhost:8080".to_string()
}

fn default_ws_path() -> String {
    "/api/v1/aiBot/ws/audio".to_string()
}

fn default_ready_poll_interval() -> u64 {
    10
}

fn default_ready_timeout() -> u64 {
    3000
}

fn default_mime_type() -> String {
    "audio/mpeg".to_string()
}

fn default_voice_input_path() -> String {
    "/api/v1/commons/voiceInput".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_record_secs() -> u64 {
    60
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: default_ws_endpoint(),
            ws_path: default_ws_path(),
            ready_poll_interval_ms: default_ready_poll_interval(),
            ready_timeout_ms: default_ready_timeout(),
            archive_limit: None,
            mime_type: default_mime_type(),
            voice_input_path: default_voice_input_path(),
            sample_rate: default_sample_rate(),
            max_record_secs: default_max_record_secs(),
        }
    }
}

impl AudioConfig {
    /// Set the websocket endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ws_endpoint = endpoint.into();
        self
    }

    /// Set the archive limit
    #[must_use]
    pub fn with_archive_limit(mut self, limit: usize) -> Self {
        self.archive_limit = Some(limit);
        self
    }

    /// Set the readiness timing
    #[must_use]
    pub fn with_readiness(mut self, poll_interval_ms: u64, timeout_ms: u64) -> Self {
        self.ready_poll_interval_ms = poll_interval_ms;
        self.ready_timeout_ms = timeout_ms;
        self
    }

    /// Readiness poll interval
    #[must_use]
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms.max(1))
    }

    /// Readiness timeout
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}
