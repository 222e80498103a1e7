//! Audio signaling client
//!
//! One persistent websocket per conversation session. Outbound frames carry
//! answer text to the remote speech renderer; inbound frames are routed to the
//! archive and the player by a [`SignalRouter`] running on a reader task.
//! There is no reconnect: once the socket closes every send fails with
//! [`Error::SocketClosed`].

use async_trait::async_trait;
use flowchat_core::{ChatMessage, VoiceSink};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::player::PlayerHandle;
use crate::protocol::SignalFrame;
use crate::router::SignalRouter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSender = SplitSink<WsStream, Message>;

/// Opens signaling sockets for one conversation session
#[derive(Debug, Clone)]
pub struct SignalingConnector {
    config: AudioConfig,
    session_id: String,
    token: Option<String>,
}

impl SignalingConnector {
    /// Connector for `session_id`, authorized by `token`
    #[must_use]
    pub fn new(config: AudioConfig, session_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            config,
            session_id: session_id.into(),
            token,
        }
    }

    /// Socket URL with session and token query parameters
    pub fn url(&self) -> Result<Url> {
        let base = format!(
            "{}{}",
            self.config.ws_endpoint.trim_end_matches('/'),
            self.config.ws_path
        );
        let mut url = Url::parse(&base).map_err(|e| Error::Config(format!("{}: {}", base, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("sessionId", &self.session_id);
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    /// Connect and start routing inbound frames into `player`
    pub async fn connect(&self, player: PlayerHandle) -> Result<AudioSignalingClient> {
        let url = self.url()?;
        info!(session_id = %self.session_id, "Connecting audio signaling socket");

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (write, read) = ws_stream.split();

        let sender = Arc::new(Mutex::new(Some(write)));
        let router = Arc::new(Mutex::new(SignalRouter::new(
            player.clone(),
            self.config.archive_limit,
        )));
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_frames(
            read,
            router.clone(),
            sender.clone(),
            connected.clone(),
        ));

        info!(session_id = %self.session_id, "Audio signaling connected");
        Ok(AudioSignalingClient {
            sender,
            router,
            player,
            connected,
            reader,
        })
    }
}

/// What [`AudioSignalingClient::speak_message`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Audio was playing and has been stopped
    Stopped,
    /// Archived audio is being replayed
    Replayed(String),
    /// Synthesis was requested under this id; store it as the session ref
    Requested(String),
}

/// Connected signaling socket plus playback control
pub struct AudioSignalingClient {
    sender: Arc<Mutex<Option<WsSender>>>,
    router: Arc<Mutex<SignalRouter>>,
    player: PlayerHandle,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl AudioSignalingClient {
    /// Whether the socket is still open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send one outbound frame
    pub async fn send_frame(&self, frame: SignalFrame) -> Result<()> {
        let text = frame.to_text()?;
        let mut guard = self.sender.lock().await;
        let Some(sender) = guard.as_mut() else {
            return Err(Error::SocketClosed);
        };
        sender.send(Message::Text(text)).await?;
        debug!(frame = frame.type_name(), message_id = frame.message_id().unwrap_or("-"), "Frame sent");
        Ok(())
    }

    /// Replay archived audio of a message
    pub async fn play(&self, message_id: &str) -> Result<()> {
        self.router.lock().await.play(message_id)
    }

    /// Halt playback and drop the playback selection; never fails
    pub async fn stop(&self) {
        self.router.lock().await.stop();
    }

    /// Whether audio is playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Playing-state notifications
    #[must_use]
    pub fn subscribe_playing(&self) -> watch::Receiver<bool> {
        self.player.subscribe_playing()
    }

    /// Whether audio for `message_id` has been archived
    pub async fn has_audio(&self, message_id: &str) -> bool {
        self.router.lock().await.archive().contains(message_id)
    }

    /// Speaker toggle for a transcript message
    ///
    /// Stops playback if audio is playing. Otherwise replays archived audio
    /// for the message's session ref, or asks the server to synthesize the
    /// full message text.
    pub async fn speak_message(&self, message: &ChatMessage) -> Result<SpeakOutcome> {
        if self.is_playing() {
            self.stop().await;
            return Ok(SpeakOutcome::Stopped);
        }

        if let Some(session_ref) = &message.session_ref {
            if self.has_audio(session_ref).await {
                self.play(session_ref).await?;
                return Ok(SpeakOutcome::Replayed(session_ref.clone()));
            }
        }

        let message_id = message
            .session_ref
            .clone()
            .unwrap_or_else(|| message.id.clone());
        self.send_frame(SignalFrame::start(&message_id)).await?;
        self.send_frame(SignalFrame::data(&message_id, &message.content))
            .await?;
        self.send_frame(SignalFrame::end(&message_id)).await?;
        info!(message_id = %message_id, "Speech requested for message");
        Ok(SpeakOutcome::Requested(message_id))
    }

    /// Close the socket and stop the reader
    pub async fn close(&self) {
        if let Some(mut sender) = self.sender.lock().await.take() {
            if let Err(e) = sender.send(Message::Close(None)).await {
                debug!(error = %e, "Close frame not sent");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        self.reader.abort();
        info!("Audio signaling closed");
    }
}

impl Drop for AudioSignalingClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl VoiceSink for AudioSignalingClient {
    async fn start(&self, message_id: &str) -> flowchat_core::Result<()> {
        Ok(self.send_frame(SignalFrame::start(message_id)).await?)
    }

    async fn data(&self, message_id: &str, content: &str) -> flowchat_core::Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        Ok(self.send_frame(SignalFrame::data(message_id, content)).await?)
    }

    async fn end(&self, message_id: &str) -> flowchat_core::Result<()> {
        Ok(self.send_frame(SignalFrame::end(message_id)).await?)
    }
}

async fn read_frames(
    mut read: SplitStream<WsStream>,
    router: Arc<Mutex<SignalRouter>>,
    sender: Arc<Mutex<Option<WsSender>>>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = router.lock().await.route_text(&text) {
                    warn!(error = %e, code = e.code(), "Signaling frame not applied");
                }
            }
            Ok(Message::Close(_)) => {
                info!("Audio signaling closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Audio signaling socket error");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    sender.lock().await.take();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_carries_session_and_token() {
        let connector = SignalingConnector::new(
            AudioConfig::default().with_endpoint("wss://chat.example.com/"),
            "sess 1",
            Some("tok".to_string()),
        );
        let url = connector.url().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/api/v1/aiBot/ws/audio");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("sessionId".to_string(), "sess 1".to_string()),
                ("token".to_string(), "tok".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_without_token() {
        let connector = SignalingConnector::new(AudioConfig::default(), "s", None);
        let url = connector.url().unwrap();
        assert_eq!(url.query(), Some("sessionId=s"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let connector = SignalingConnector::new(
            AudioConfig::default().with_endpoint("not a url"),
            "s",
            None,
        );
        assert!(matches!(connector.url(), Err(Error::Config(_))));
    }
}
