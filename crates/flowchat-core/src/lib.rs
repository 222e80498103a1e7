//! Flowchat Core - Streaming Chat Engine
//!
//! This crate turns an incrementally streamed assistant response into a
//! typed-out transcript with structured "thought chain" side panels:
//! - Decoder: raw transport chunks to typed [`StreamEvent`]s
//! - Accumulator: tracks the open event kind across chunk boundaries
//! - Handler: pluggable interception of event progress/completion
//! - Thought chain: per-message ordered reasoning/tool-call entries
//! - Typewriter: decouples network arrival rate from reveal rate
//! - Session: one request/response cycle (submit / regenerate)
//! - Mirror: optional local copy of the transcript
//! - Voice: hand-off of plain answer text to a speech side channel
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flowchat_core::{ChatSession, HttpRequester, SessionConfig};
//! use std::sync::Arc;
//!
//! let requester = Arc::new(HttpRequester::new(request_config));
//! let mut session = ChatSession::new(requester, SessionConfig::default());
//!
//! session.submit("hello").await?;
//! println!("{}", session.transcript().last().unwrap().content);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accumulator;
pub mod decoder;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod mirror;
pub mod render;
pub mod request;
pub mod session;
pub mod thought_chain;
pub mod transcript;
pub mod typewriter;
pub mod voice;

pub use accumulator::{EventAccumulator, Transition};
pub use decoder::{ChunkDecoder, Utf8StreamDecoder};
pub use error::{Error, Result};
pub use event::{EventKind, EventPayload, MetadataMap, StreamEvent, StreamStatus};
pub use handler::{EventData, EventHandler, HandlerOutcome, SessionView};
pub use message::{ChatMessage, Role};
pub use mirror::{JsonFileMirror, TranscriptMirror};
pub use render::{NullRender, RenderSink, ScrollFollow};
pub use request::{ByteStream, ChatRequester, HttpRequester, RequestConfig};
pub use session::{ChatSession, MalformedPolicy, SessionConfig};
pub use thought_chain::{ThoughtChain, ThoughtChainItem, ThoughtStatus};
pub use transcript::Transcript;
pub use typewriter::TypewriterScheduler;
pub use voice::VoiceSink;
