//! Media sinks
//!
//! A [`MediaSink`] is a streaming audio consumer that accepts one append at a
//! time and reports completion asynchronously. The player owns exactly one
//! sink per playback pipeline and creates it through a [`SinkFactory`].

use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};

pub mod memory;
#[cfg(feature = "speaker")]
pub mod speaker;

pub use memory::{MemoryProbe, MemorySink, MemorySinkFactory};
#[cfg(feature = "speaker")]
pub use speaker::{RodioSink, RodioSinkFactory};

/// Completion of one append
pub type AppendDone = oneshot::Receiver<Result<()>>;

/// Streaming audio consumer
pub trait MediaSink: Send {
    /// Whether appends are accepted yet
    fn is_ready(&self) -> bool;

    /// One-shot readiness notification, if the sink supports one
    ///
    /// Sinks returning `None` are polled through [`MediaSink::is_ready`].
    fn ready_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        None
    }

    /// Whether the sink is still processing an append
    fn is_updating(&self) -> bool;

    /// Hand one chunk to the sink; the receiver fires when it is consumed
    fn append(&mut self, chunk: Vec<u8>) -> AppendDone;

    /// Begin audible playback
    fn play(&mut self) -> Result<()>;

    /// No more data will be appended
    fn end_of_stream(&mut self) -> Result<()>;

    /// Halt playback and discard buffered data
    fn abort(&mut self) -> Result<()>;
}

/// Creates a fresh sink for each playback pipeline
pub trait SinkFactory: Send + Sync {
    /// Open a sink for `mime_type`
    fn create(&self, mime_type: &str) -> Result<Box<dyn MediaSink>>;
}

/// Wait until `sink` accepts appends
///
/// Uses the sink's readiness notification when it has one and falls back to
/// polling every `poll_every`. Either way, gives up after `timeout`.
pub async fn wait_ready(
    sink: &mut dyn MediaSink,
    poll_every: Duration,
    timeout: Duration,
) -> Result<()> {
    if sink.is_ready() {
        return Ok(());
    }

    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    if let Some(signal) = sink.ready_signal() {
        debug!("Waiting for sink ready signal");
        return match tokio::time::timeout(timeout, signal).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::SinkNotReady("ready signal dropped".to_string())),
            Err(_) => Err(Error::ReadyTimeout(timeout_ms)),
        };
    }

    debug!(poll_ms = poll_every.as_millis() as u64, "Polling sink readiness");
    let poll = async move {
        let mut ticker = tokio::time::interval(poll_every);
        loop {
            ticker.tick().await;
            if sink.is_ready() {
                break;
            }
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| Error::ReadyTimeout(timeout_ms))
}
