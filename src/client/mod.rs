//! Chat client wiring
//!
//! Builds a [`ChatSession`] and its collaborators from [`AppConfig`]: HTTP
//! requester, local mirror, terminal renderer and, when voice is enabled, the
//! audio signaling socket with its player.

pub mod config;
pub mod loader;
pub mod render;

use anyhow::{bail, Context, Result};
use flowchat_audio::{
    default_sink_factory, AudioSignalingClient, SignalingConnector, SpeakOutcome, StreamPlayer,
    VoiceInputClient,
};
use flowchat_core::{
    ChatSession, HttpRequester, JsonFileMirror, RenderSink, Transcript, VoiceSink,
};
use std::sync::Arc;
use tracing::{info, warn};

pub use config::AppConfig;
pub use loader::load_config;

/// A configured conversation
pub struct ChatClient {
    session: ChatSession,
    voice: Option<Arc<AudioSignalingClient>>,
    voice_input: VoiceInputClient,
    #[cfg(feature = "microphone")]
    recorder: flowchat_audio::VoiceRecorder,
}

impl ChatClient {
    /// Build the session and connect the voice channel if enabled
    pub async fn connect(config: &AppConfig, render: Box<dyn RenderSink>) -> Result<Self> {
        let requester = Arc::new(HttpRequester::new(config.server.clone()));
        let mut session = ChatSession::new(requester, config.session.clone()).with_render(render);

        if config.mirror.enabled {
            let path = config.mirror.path();
            session = session.with_mirror(Arc::new(JsonFileMirror::new(&path)));
            let restored = session
                .restore()
                .with_context(|| format!("Failed to restore transcript from {}", path.display()))?;
            if restored > 0 {
                info!(count = restored, "Restored local transcript");
            }
        }

        let voice = if config.session.voice_enabled {
            let player = StreamPlayer::spawn(default_sink_factory(), &config.audio);
            let connector = SignalingConnector::new(
                config.audio.clone(),
                config.server.session_id.clone(),
                config.server.token.clone(),
            );
            match connector.connect(player).await {
                Ok(client) => {
                    let client = Arc::new(client);
                    session = session.with_voice(client.clone() as Arc<dyn VoiceSink>);
                    Some(client)
                }
                Err(e) => {
                    warn!(error = %e, "Voice channel unavailable, continuing without voice");
                    session.set_voice_enabled(false);
                    None
                }
            }
        } else {
            None
        };

        let voice_input = VoiceInputClient::new(
            &config.server.base_url,
            &config.audio,
            config.server.auth_header.clone(),
            config.server.token.clone(),
        );

        Ok(Self {
            session,
            voice,
            voice_input,
            #[cfg(feature = "microphone")]
            recorder: flowchat_audio::VoiceRecorder::new(
                config.audio.sample_rate,
                config.audio.max_record_secs,
            ),
        })
    }

    /// Conversation so far
    pub fn transcript(&self) -> &Transcript {
        self.session.transcript()
    }

    /// Send a prompt and stream the answer
    pub async fn submit(&mut self, text: &str) -> Result<usize> {
        Ok(self.session.submit(text).await?)
    }

    /// Ask again for the answer at `index`
    pub async fn regenerate(&mut self, index: usize) -> Result<usize> {
        Ok(self.session.regenerate(index).await?)
    }

    /// Speaker toggle for the message at `index`
    pub async fn speak(&mut self, index: usize) -> Result<SpeakOutcome> {
        let Some(voice) = self.voice.clone() else {
            bail!("voice channel is not connected");
        };
        let message = self
            .session
            .transcript()
            .get(index)
            .cloned()
            .with_context(|| format!("no message at index {}", index))?;

        let outcome = voice.speak_message(&message).await?;
        if let SpeakOutcome::Requested(id) = &outcome {
            if message.session_ref.is_none() {
                self.session.set_session_ref(index, id.clone())?;
            }
        }
        Ok(outcome)
    }

    /// Halt voice playback
    pub async fn stop_audio(&self) {
        if let Some(voice) = &self.voice {
            voice.stop().await;
        }
    }

    /// Forget the conversation
    pub async fn clear(&mut self) -> Result<()> {
        self.stop_audio().await;
        Ok(self.session.clear()?)
    }

    /// Start or finish a voice recording
    ///
    /// Returns the recognized text when a recording was finished.
    #[cfg(feature = "microphone")]
    pub async fn toggle_recording(&mut self) -> Result<Option<String>> {
        use flowchat_audio::RecorderState;

        match self.recorder.state() {
            RecorderState::Idle => {
                self.recorder.start()?;
                Ok(None)
            }
            RecorderState::Recording => {
                let wav = self.recorder.stop()?;
                let text = self.voice_input.transcribe(wav).await?;
                Ok(Some(text))
            }
        }
    }

    /// Start or finish a voice recording
    #[cfg(not(feature = "microphone"))]
    pub async fn toggle_recording(&mut self) -> Result<Option<String>> {
        bail!(
            "built without microphone support (upload endpoint: {})",
            self.voice_input.url()
        )
    }

    /// Close the voice channel
    pub async fn shutdown(&self) {
        if let Some(voice) = &self.voice {
            voice.close().await;
        }
    }
}
