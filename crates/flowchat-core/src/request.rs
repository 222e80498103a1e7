//! Request collaborator
//!
//! The session does not know how a response is produced; it only needs a
//! function from the transcript to a stream of bytes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::message::{ChatMessage, Role};

/// Raw response stream, one item per transport read
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opens a streaming response for a transcript
#[async_trait]
pub trait ChatRequester: Send + Sync {
    /// Send the transcript (ending with the new user message)
    async fn request(&self, transcript: &[ChatMessage]) -> Result<ByteStream>;
}

/// HTTP request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Server base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Streaming chat path
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Bot to talk to
    #[serde(default)]
    pub bot_id: String,

    /// Conversation id on the server
    #[serde(default)]
    pub session_id: String,

    /// Authorization token (omitted for local sessions)
    #[serde(default)]
    pub token: Option<String>,

    /// Header carrying the token
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_chat_path() -> String {
    "/api/v1/aiBot/chat".to_string()
}

fn default_auth_header() -> String {
    "aiflowy-token".to_string()
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            bot_id: String::new(),
            session_id: String::new(),
            token: None,
            auth_header: default_auth_header(),
        }
    }
}

impl RequestConfig {
    /// Full chat URL
    #[must_use]
    pub fn chat_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.chat_path
        )
    }
}

/// Streams responses from the chat HTTP endpoint
pub struct HttpRequester {
    client: reqwest::Client,
    config: RequestConfig,
}

impl HttpRequester {
    /// Create a requester
    #[must_use]
    pub fn new(config: RequestConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    fn body(&self, transcript: &[ChatMessage]) -> serde_json::Value {
        let last_user = transcript.iter().rev().find(|m| m.role == Role::User);
        let history: Vec<_> = transcript
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();

        json!({
            "botId": self.config.bot_id,
            "sessionId": self.config.session_id,
            "prompt": last_user.map(|m| m.content.as_str()).unwrap_or_default(),
            "fileList": last_user.map(|m| m.files.clone()).unwrap_or_default(),
            "messages": history,
        })
    }
}

#[async_trait]
impl ChatRequester for HttpRequester {
    async fn request(&self, transcript: &[ChatMessage]) -> Result<ByteStream> {
        let url = self.config.chat_url();
        info!(url = %url, messages = transcript.len(), "Opening chat stream");

        let mut builder = self.client.post(&url).json(&self.body(transcript));
        if let Some(token) = &self.config.token {
            builder = builder.header(self.config.auth_header.as_str(), token.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("HTTP {}: {}", status, text)));
        }

        debug!(status = %status, "Chat stream opened");
        Ok(response
            .bytes_stream()
            .map(|item| item.map_err(|e| Error::stream_read(e.to_string())))
            .boxed())
    }
}
