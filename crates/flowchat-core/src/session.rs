//! Chat session
//!
//! Orchestrates one request/response cycle: appends the user turn and an
//! assistant placeholder, opens the response stream and drives
//! decoder → accumulator → (thought chain | typewriter) until the stream ends,
//! then waits for the typewriter to catch up and finalizes the message.
//!
//! The read loop and the reveal tick run in the same task (`select!`), so the
//! two never write to the message concurrently and there is exactly one tick
//! timer per turn.

use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::accumulator::{EventAccumulator, Transition};
use crate::decoder::{ChunkDecoder, Utf8StreamDecoder};
use crate::error::{Error, Result};
use crate::event::{EventKind, StreamEvent, StreamStatus};
use crate::handler::{EventData, EventHandler, SessionView};
use crate::message::{ChatMessage, Role};
use crate::mirror::TranscriptMirror;
use crate::render::{NullRender, RenderSink, ScrollFollow};
use crate::request::ChatRequester;
use crate::transcript::Transcript;
use crate::typewriter::TypewriterScheduler;
use crate::voice::VoiceSink;

/// What to do with a chunk that is not a valid envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log and discard
    Drop,
    /// Treat the raw text as answer content
    AppendRaw,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Typewriter tick (ms)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Characters revealed per tick
    #[serde(default = "default_reveal_step")]
    pub reveal_step: usize,

    /// Forward answer text to the voice channel
    #[serde(default)]
    pub voice_enabled: bool,

    /// Malformed chunk policy for `submit`
    #[serde(default = "default_malformed_on_submit")]
    pub malformed_on_submit: MalformedPolicy,

    /// Malformed chunk policy for `regenerate`
    #[serde(default = "default_malformed_on_regenerate")]
    pub malformed_on_regenerate: MalformedPolicy,

    /// Leading artifact removed from finished answers (case-insensitive)
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: String,
}

fn default_tick_interval() -> u64 {
    50
}

fn default_reveal_step() -> usize {
    2
}

fn default_malformed_on_submit() -> MalformedPolicy {
    MalformedPolicy::Drop
}

fn default_malformed_on_regenerate() -> MalformedPolicy {
    MalformedPolicy::AppendRaw
}

fn default_strip_prefix() -> String {
    "Final Answer:".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            reveal_step: default_reveal_step(),
            voice_enabled: false,
            malformed_on_submit: default_malformed_on_submit(),
            malformed_on_regenerate: default_malformed_on_regenerate(),
            strip_prefix: default_strip_prefix(),
        }
    }
}

impl SessionConfig {
    /// Enable or disable voice forwarding
    #[must_use]
    pub fn with_voice(mut self, enabled: bool) -> Self {
        self.voice_enabled = enabled;
        self
    }

    /// Set the typewriter pace
    #[must_use]
    pub fn with_pace(mut self, tick_interval_ms: u64, reveal_step: usize) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self.reveal_step = reveal_step;
        self
    }

    /// Tick as a duration
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Per-turn protocol state, owned by the driver for the duration of a turn
struct TurnState {
    index: usize,
    policy: MalformedPolicy,
    accumulator: EventAccumulator,
    typewriter: TypewriterScheduler,
    voice_message_id: Option<String>,
}

/// One conversation with its transcript and collaborators
pub struct ChatSession {
    transcript: Transcript,
    requester: Arc<dyn ChatRequester>,
    decoder: ChunkDecoder,
    handler: Option<Arc<dyn EventHandler>>,
    voice: Option<Arc<dyn VoiceSink>>,
    mirror: Option<Arc<dyn TranscriptMirror>>,
    render: Box<dyn RenderSink>,
    scroll: ScrollFollow,
    prefix: Option<Regex>,
    config: SessionConfig,
    sending: bool,
    streaming: bool,
}

impl ChatSession {
    /// Create a session with an empty transcript
    pub fn new(requester: Arc<dyn ChatRequester>, config: SessionConfig) -> Self {
        let prefix = build_prefix(&config.strip_prefix);
        Self {
            transcript: Transcript::new(),
            requester,
            decoder: ChunkDecoder::new(),
            handler: None,
            voice: None,
            mirror: None,
            render: Box::new(NullRender),
            scroll: ScrollFollow::default(),
            prefix,
            config,
            sending: false,
            streaming: false,
        }
    }

    /// Install a custom event handler
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Install the voice side channel
    #[must_use]
    pub fn with_voice(mut self, voice: Arc<dyn VoiceSink>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Mirror the transcript locally
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn TranscriptMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Report visible changes to `render`
    #[must_use]
    pub fn with_render(mut self, render: Box<dyn RenderSink>) -> Self {
        self.render = render;
        self
    }

    /// Start from an existing transcript
    #[must_use]
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    /// Restore the transcript from the mirror, returning the message count
    pub fn restore(&mut self) -> Result<usize> {
        let Some(mirror) = &self.mirror else {
            return Ok(0);
        };
        let messages = mirror.load()?;
        info!(count = messages.len(), "Transcript restored from mirror");
        self.transcript = Transcript::from_messages(messages);
        Ok(self.transcript.len())
    }

    /// Conversation buffer
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a turn is in progress
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Whether a response stream is being read
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Auto-scroll state
    pub fn scroll_mut(&mut self) -> &mut ScrollFollow {
        &mut self.scroll
    }

    /// Enable or disable voice forwarding for later turns
    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.config.voice_enabled = enabled;
    }

    /// Record the server session id of a message (used as its voice key)
    pub fn set_session_ref(&mut self, index: usize, session_ref: impl Into<String>) -> Result<()> {
        let message = self
            .transcript
            .get_mut(index)
            .ok_or(Error::InvalidIndex(index))?;
        message.session_ref = Some(session_ref.into());
        self.save_mirror();
        Ok(())
    }

    /// Drop the whole conversation, including the local mirror
    pub fn clear(&mut self) -> Result<()> {
        self.transcript.clear();
        if let Some(mirror) = &self.mirror {
            mirror.clear()?;
        }
        Ok(())
    }

    /// Send a new user message and stream the answer
    ///
    /// Returns the index of the assistant message.
    pub async fn submit(&mut self, text: &str) -> Result<usize> {
        self.submit_with_files(text, Vec::new()).await
    }

    /// Send a new user message with attached files
    pub async fn submit_with_files(&mut self, text: &str, files: Vec<String>) -> Result<usize> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        let user = ChatMessage::user(text).with_files(files);
        let policy = self.config.malformed_on_submit;
        self.run_turn(user, policy).await
    }

    /// Ask again for the assistant message at `index`
    ///
    /// The preceding user message is re-issued as a new turn; the original
    /// attempt stays in the transcript.
    pub async fn regenerate(&mut self, index: usize) -> Result<usize> {
        let is_assistant = self
            .transcript
            .get(index)
            .is_some_and(ChatMessage::is_assistant);
        let previous = index
            .checked_sub(1)
            .and_then(|i| self.transcript.get(i))
            .filter(|m| m.role == Role::User);

        let user = match (is_assistant, previous) {
            (true, Some(prev)) => {
                ChatMessage::user(prev.content.clone()).with_files(prev.files.clone())
            }
            _ => return Err(Error::InvalidIndex(index)),
        };

        info!(index, "Regenerating answer");
        let policy = self.config.malformed_on_regenerate;
        self.run_turn(user, policy).await
    }

    async fn run_turn(&mut self, user: ChatMessage, policy: MalformedPolicy) -> Result<usize> {
        self.sending = true;
        self.streaming = true;

        let mut request_messages = self.transcript.messages().to_vec();
        request_messages.push(user.clone());

        let user_index = self.transcript.push(user);
        self.notify_message(user_index);
        let index = self.transcript.push(ChatMessage::assistant_placeholder());
        self.notify_message(index);
        self.follow_output();
        self.save_mirror();

        let result = self.drive(index, &request_messages, policy).await;

        // Cleanup runs on every exit path
        self.sending = false;
        self.streaming = false;
        if let Some(message) = self.transcript.get_mut(index) {
            message.loading = false;
            message.touch();
            self.render.turn_finished(index, message);
        }
        self.save_mirror();

        match result {
            Ok(()) => Ok(index),
            Err(e) => {
                error!(error = %e, "Chat turn aborted");
                Err(e)
            }
        }
    }

    async fn drive(
        &mut self,
        index: usize,
        request_messages: &[ChatMessage],
        policy: MalformedPolicy,
    ) -> Result<()> {
        let mut stream = self.requester.request(request_messages).await?;

        let mut turn = TurnState {
            index,
            policy,
            accumulator: EventAccumulator::new(),
            typewriter: TypewriterScheduler::new(
                self.config.tick_interval(),
                self.config.reveal_step,
            ),
            voice_message_id: None,
        };
        let mut utf8 = Utf8StreamDecoder::new();

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(bytes)) => {
                        let text = utf8.push(&bytes);
                        if !text.is_empty() {
                            self.handle_chunk(&mut turn, &text).await;
                        }
                    }
                    Some(Err(e)) => {
                        // Keep everything accepted so far
                        turn.typewriter.finish();
                        turn.typewriter
                            .when_caught_up(|text| self.write_revealed(index, text))
                            .await;
                        return Err(match e {
                            Error::StreamRead(_) => e,
                            other => Error::stream_read(other.to_string()),
                        });
                    }
                    None => break,
                },
                _ = turn.typewriter.tick() => {
                    if turn.typewriter.advance() {
                        let revealed = turn.typewriter.revealed().to_string();
                        self.write_revealed(index, &revealed);
                    }
                }
            }
        }

        let rest = utf8.finish();
        if !rest.trim().is_empty() {
            self.handle_chunk(&mut turn, &rest).await;
        }

        debug!(index, "Response stream ended");
        self.end_voice(&turn).await;

        if let Some(transition) = turn.accumulator.finish() {
            self.apply_transition(&mut turn, transition).await;
        }

        turn.typewriter.finish();
        turn.typewriter
            .when_caught_up(|text| self.write_revealed(index, text))
            .await;

        self.finalize(index);
        Ok(())
    }

    async fn handle_chunk(&mut self, turn: &mut TurnState, text: &str) {
        let event = match self.decoder.decode(text) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(Error::MalformedChunk { raw, reason }) => {
                match turn.policy {
                    MalformedPolicy::Drop => {
                        warn!(reason = %reason, "Malformed chunk dropped");
                    }
                    MalformedPolicy::AppendRaw => {
                        warn!(reason = %reason, "Malformed chunk appended as text");
                        turn.typewriter.append_raw(&raw);
                    }
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "Chunk decoding failed");
                return;
            }
        };

        self.forward_voice(turn, &event).await;

        for transition in turn.accumulator.accept(event) {
            self.apply_transition(turn, transition).await;
        }
    }

    async fn apply_transition(&mut self, turn: &mut TurnState, transition: Transition) {
        match transition {
            Transition::Progress {
                kind,
                event,
                accumulated,
            } => {
                if kind.is_content() {
                    self.capture_session_ref(turn.index, &event);
                    turn.typewriter.push(event.content());
                    return;
                }

                let data = EventData::progress(&event, &accumulated);
                if self.intercept(&kind, &data, false).await {
                    return;
                }
                self.default_progress(&kind, &data);
            }
            Transition::Complete {
                kind,
                accumulated,
                event_ids,
            } => {
                let data = EventData::complete(&accumulated, &event_ids);
                if self.intercept(&kind, &data, true).await {
                    return;
                }
                self.default_complete(&kind, &data);
            }
        }
    }

    /// Offer a transition to the custom handler; `true` skips the default
    async fn intercept(&mut self, kind: &EventKind, data: &EventData, complete: bool) -> bool {
        let Some(handler) = self.handler.clone() else {
            return false;
        };

        let mut view = SessionView {
            transcript: &mut self.transcript,
        };
        let result = if complete {
            handler.on_complete(kind, data, &mut view).await
        } else {
            handler.on_progress(kind, data, &mut view).await
        };

        match result {
            Ok(outcome) if outcome.handled => {
                if let Some(index) = self.transcript.last_assistant_index() {
                    self.notify_message(index);
                }
                self.save_mirror();
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Custom event handler failed, using default");
                false
            }
        }
    }

    fn default_progress(&mut self, kind: &EventKind, data: &EventData) {
        if !kind.is_thought_chain() {
            debug!(kind = %kind, "Unhandled event kind ignored");
            return;
        }

        let Some(index) = self.transcript.last_assistant_index() else {
            warn!(kind = %kind, "No assistant message for thought chain event");
            return;
        };
        let Some(id) = data.id.as_deref() else {
            warn!(kind = %kind, "Event has no id, skipping thought chain");
            return;
        };

        if let Some(message) = self.transcript.get_mut(index) {
            message.loading = false;
            let added = message.thought_chain.upsert(
                id,
                data.metadata_map.chain_title.as_deref(),
                &data.accumulated_content,
            );
            message.touch();
            if added {
                debug!(kind = %kind, id = %id, "Thought chain entry added");
            }
            self.render.thought_chain_changed(index, message);
        }
        self.follow_output();
        self.save_mirror();
    }

    fn default_complete(&mut self, kind: &EventKind, data: &EventData) {
        if !kind.is_thought_chain() || data.event_ids.is_empty() {
            return;
        }
        let Some(index) = self.transcript.last_assistant_index() else {
            return;
        };
        if let Some(message) = self.transcript.get_mut(index) {
            for id in &data.event_ids {
                message.thought_chain.mark_done(id);
            }
            message.touch();
            self.render.thought_chain_changed(index, message);
        }
        self.save_mirror();
    }

    fn capture_session_ref(&mut self, index: usize, event: &StreamEvent) {
        let Some(session_ref) = event.metadata.message_session_id.as_deref() else {
            return;
        };
        if let Some(message) = self.transcript.get_mut(index) {
            if message.session_ref.is_none() {
                message.session_ref = Some(session_ref.to_string());
            }
        }
    }

    async fn forward_voice(&self, turn: &mut TurnState, event: &StreamEvent) {
        if !self.config.voice_enabled {
            return;
        }
        let Some(voice) = &self.voice else {
            return;
        };

        match event.payload.status {
            Some(StreamStatus::Start) => {
                let Some(message_id) = event.payload.message_id.clone() else {
                    warn!("START frame without messageId, voice disabled for this turn");
                    return;
                };
                if let Err(e) = voice.start(&message_id).await {
                    warn!(message_id = %message_id, error = %e, "Voice start failed");
                }
                turn.voice_message_id = Some(message_id);
            }
            Some(StreamStatus::End) => {}
            None => {
                let content = event.content();
                if !event.kind.is_content() || content.is_empty() {
                    return;
                }
                if let Some(message_id) = &turn.voice_message_id {
                    if let Err(e) = voice.data(message_id, content).await {
                        warn!(message_id = %message_id, error = %e, "Voice data failed");
                    }
                }
            }
        }
    }

    async fn end_voice(&self, turn: &TurnState) {
        if !self.config.voice_enabled {
            return;
        }
        if let (Some(voice), Some(message_id)) = (&self.voice, &turn.voice_message_id) {
            if let Err(e) = voice.end(message_id).await {
                warn!(message_id = %message_id, error = %e, "Voice end failed");
            }
        }
    }

    fn write_revealed(&mut self, index: usize, text: &str) {
        if let Some(message) = self.transcript.get_mut(index) {
            message.loading = false;
            message.content.clear();
            message.content.push_str(text);
            message.touch();
            self.render.message_changed(index, message);
        }
        self.follow_output();
    }

    fn finalize(&mut self, index: usize) {
        if let Some(message) = self.transcript.get_mut(index) {
            if let Some(prefix) = &self.prefix {
                let stripped = prefix.replace(&message.content, "");
                if stripped.len() != message.content.len() {
                    message.content = stripped.into_owned();
                    self.render.message_changed(index, message);
                }
            }
            message.loading = false;
            info!(index, chars = message.content.chars().count(), "Answer complete");
        }
    }

    fn notify_message(&mut self, index: usize) {
        if let Some(message) = self.transcript.get(index) {
            self.render.message_changed(index, message);
        }
    }

    fn follow_output(&mut self) {
        if self.scroll.is_following() {
            self.render.scroll_to_bottom();
        }
    }

    fn save_mirror(&self) {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.save(self.transcript.messages()) {
                warn!(error = %e, "Failed to mirror transcript");
            }
        }
    }
}

fn build_prefix(prefix: &str) -> Option<Regex> {
    if prefix.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)^{}\s*", regex::escape(prefix))).ok()
}
