//! Flowchat Audio - Voice Side Channel
//!
//! This crate speaks assistant answers through a remote speech renderer:
//! - Signaling: one websocket per conversation carrying text out and audio in
//! - Archive: received audio per message, for replay
//! - Player: ordered, one-at-a-time appends into a streaming media sink
//! - Voice input: microphone capture and speech-to-text upload
//!
//! # Features
//!
//! - `speaker`: play through the default output device (rodio)
//! - `microphone`: capture voice input (cpal)
//!
//! Without `speaker`, received audio is counted and dropped by
//! [`MemorySinkFactory::discarding`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use flowchat_audio::{AudioConfig, MemorySinkFactory, SignalingConnector, StreamPlayer};
//! use std::sync::Arc;
//!
//! let config = AudioConfig::default();
//! let player = StreamPlayer::spawn(Arc::new(MemorySinkFactory::new()), &config);
//! let connector = SignalingConnector::new(config, session_id, Some(token));
//! let voice = Arc::new(connector.connect(player).await?);
//!
//! let session = ChatSession::new(requester, session_config).with_voice(voice.clone());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod error;
pub mod player;
pub mod protocol;
pub mod queue;
#[cfg(feature = "microphone")]
pub mod recorder;
pub mod router;
pub mod signaling;
pub mod sink;
pub mod voice_input;

pub use archive::VoiceArchive;
pub use config::AudioConfig;
pub use error::{Error, Result};
pub use player::{PlayerHandle, StreamPlayer};
pub use protocol::SignalFrame;
pub use queue::AudioBufferQueue;
#[cfg(feature = "microphone")]
pub use recorder::{RecorderState, VoiceRecorder};
pub use router::SignalRouter;
pub use signaling::{AudioSignalingClient, SignalingConnector, SpeakOutcome};
#[cfg(feature = "speaker")]
pub use sink::{RodioSink, RodioSinkFactory};
pub use sink::{MediaSink, MemoryProbe, MemorySink, MemorySinkFactory, SinkFactory};
pub use voice_input::{samples_to_wav, VoiceInputClient};

/// Sink factory for this build: the speaker when available, otherwise a
/// sink that discards audio
#[must_use]
pub fn default_sink_factory() -> std::sync::Arc<dyn SinkFactory> {
    #[cfg(feature = "speaker")]
    {
        std::sync::Arc::new(RodioSinkFactory)
    }
    #[cfg(not(feature = "speaker"))]
    {
        tracing::warn!("Built without the `speaker` feature, received voice audio is discarded");
        std::sync::Arc::new(MemorySinkFactory::discarding())
    }
}
