//! Inbound signaling frame routing
//!
//! Applies inbound frames to the archive and the player. Kept apart from the
//! socket so it can be driven directly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::archive::VoiceArchive;
use crate::error::Result;
use crate::player::PlayerHandle;
use crate::protocol::SignalFrame;

/// Archive plus playback selection
#[derive(Debug)]
pub struct SignalRouter {
    archive: VoiceArchive,
    selected: Option<String>,
    player: PlayerHandle,
}

impl SignalRouter {
    /// Route into `player`, keeping at most `archive_limit` messages
    #[must_use]
    pub fn new(player: PlayerHandle, archive_limit: Option<usize>) -> Self {
        Self {
            archive: VoiceArchive::with_limit(archive_limit),
            selected: None,
            player,
        }
    }

    /// Message currently selected for playback
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Received audio
    #[must_use]
    pub fn archive(&self) -> &VoiceArchive {
        &self.archive
    }

    /// Parse and apply a text frame
    pub fn route_text(&mut self, text: &str) -> Result<()> {
        let frame = SignalFrame::parse(text)?;
        self.route(frame)
    }

    /// Apply one inbound frame
    pub fn route(&mut self, frame: SignalFrame) -> Result<()> {
        match frame {
            SignalFrame::Start { message_id } => {
                info!(message_id = %message_id, "Voice stream started");
                self.player.start_stream()?;
                self.archive.reset(&message_id);
                self.selected = Some(message_id);
            }
            SignalFrame::Data {
                message_id,
                content,
            } => {
                let is_selected = self.selected.as_deref() == Some(message_id.as_str());
                let bytes = if is_selected {
                    Some(STANDARD.decode(&content))
                } else {
                    None
                };
                self.archive.append(&message_id, content);

                if let Some(bytes) = bytes {
                    let bytes = bytes?;
                    debug!(message_id = %message_id, bytes = bytes.len(), "Voice chunk received");
                    self.player.append_audio_data(bytes)?;
                }
            }
            SignalFrame::End { message_id } => {
                if self.selected.as_deref() == Some(message_id.as_str()) {
                    self.player.end_stream()?;
                }
                self.archive.finish(&message_id, self.selected.as_deref());
                info!(message_id = %message_id, "Voice stream finished");
            }
            SignalFrame::Error {
                message_id,
                content,
            } => {
                warn!(
                    message_id = message_id.as_deref().unwrap_or("-"),
                    error = content.as_deref().unwrap_or("unknown"),
                    "Voice server reported an error"
                );
            }
        }
        Ok(())
    }

    /// Replay an archived message from the beginning
    pub fn play(&mut self, message_id: &str) -> Result<()> {
        let buffer = self.archive.decode(message_id)?;
        info!(message_id = %message_id, bytes = buffer.len(), "Replaying archived voice");
        self.selected = Some(message_id.to_string());
        self.player.play_buffer(buffer)
    }

    /// Halt playback and drop the selection
    ///
    /// Later chunks of the stopped message are still archived but no longer
    /// played.
    pub fn stop(&mut self) {
        if let Some(message_id) = self.selected.take() {
            debug!(message_id = %message_id, "Playback selection cleared");
        }
        self.player.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::player::StreamPlayer;
    use crate::sink::MemorySinkFactory;
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("router did not settle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_data_end_then_replay() {
        let factory = MemorySinkFactory::new();
        let probe = factory.probe();
        let player = StreamPlayer::spawn(Arc::new(factory), &AudioConfig::default());
        let mut router = SignalRouter::new(player, None);

        router.route(SignalFrame::start("s1")).unwrap();
        router.route(SignalFrame::data("s1", "QQ==")).unwrap();
        router.route(SignalFrame::end("s1")).unwrap();

        assert_eq!(router.archive().chunks("s1").unwrap(), ["QQ=="]);
        assert_eq!(router.selected(), Some("s1"));
        settle(|| probe.ended() == 1).await;
        assert_eq!(probe.appended(), vec![b"A".to_vec()]);

        router.play("s1").unwrap();
        settle(|| probe.ended() == 2).await;
        assert_eq!(probe.appended(), vec![b"A".to_vec(), b"A".to_vec()]);
        assert_eq!(probe.sinks_created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unselected_data_is_archived_only() {
        let factory = MemorySinkFactory::new();
        let probe = factory.probe();
        let player = StreamPlayer::spawn(Arc::new(factory), &AudioConfig::default());
        let mut router = SignalRouter::new(player, None);

        router.route(SignalFrame::start("s1")).unwrap();
        router.route(SignalFrame::data("other", "Qg==")).unwrap();
        router.route(SignalFrame::data("s1", "QQ==")).unwrap();

        settle(|| probe.appended().len() == 1).await;
        assert_eq!(probe.appended(), vec![b"A".to_vec()]);
        assert!(router.archive().contains("other"));
    }

    #[tokio::test]
    async fn test_invalid_frames_are_errors() {
        let player = StreamPlayer::spawn(
            Arc::new(MemorySinkFactory::new()),
            &AudioConfig::default(),
        );
        let mut router = SignalRouter::new(player, None);

        assert!(router.route_text("not json").is_err());
        tokio_test::assert_ok!(router.route_text(r#"{"type":"_error_","content":"boom"}"#));
        assert!(router.play("missing").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_selection() {
        let factory = MemorySinkFactory::new();
        let probe = factory.probe();
        let player = StreamPlayer::spawn(Arc::new(factory), &AudioConfig::default());
        let mut router = SignalRouter::new(player.clone(), None);

        router.route(SignalFrame::start("s1")).unwrap();
        router.route(SignalFrame::data("s1", "QQ==")).unwrap();
        settle(|| probe.appended().len() == 1).await;

        router.stop();
        assert_eq!(router.selected(), None);
        router.route(SignalFrame::data("s1", "Qg==")).unwrap();
        router.route(SignalFrame::end("s1")).unwrap();

        assert_eq!(router.archive().chunks("s1").unwrap(), ["QQ==", "Qg=="]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.appended(), vec![b"A".to_vec()]);
        assert_eq!(probe.ended(), 0);
        assert!(!player.is_playing());
    }
}
