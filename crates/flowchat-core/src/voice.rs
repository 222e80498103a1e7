//! Voice side channel hand-off
//!
//! When voice output is enabled the session forwards the plain answer text
//! (never the thought chain events) to a [`VoiceSink`], keyed by the message
//! id the server announced with `status: START`.

use async_trait::async_trait;

use crate::error::Result;

/// Receiver of answer text to be spoken
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// A new spoken message begins
    async fn start(&self, message_id: &str) -> Result<()>;

    /// More text for the message
    async fn data(&self, message_id: &str, content: &str) -> Result<()>;

    /// No more text for the message
    async fn end(&self, message_id: &str) -> Result<()>;
}
