//! Voice side channel against an in-process websocket server

use async_trait::async_trait;
use bytes::Bytes;
use flowchat_audio::{AudioConfig, MemorySinkFactory, SignalingConnector, StreamPlayer};
use flowchat_core::{ByteStream, ChatMessage, ChatRequester, ChatSession, Result, SessionConfig};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

struct OneTurn(Vec<String>);

#[async_trait]
impl ChatRequester for OneTurn {
    async fn request(&self, _transcript: &[ChatMessage]) -> Result<ByteStream> {
        let items: Vec<Result<Bytes>> = self.0.iter().cloned().map(|c| Ok(Bytes::from(c))).collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

fn envelope(data: Value) -> String {
    json!({ "data": data.to_string() }).to_string()
}

/// Accepts one client, reports its frames and answers every `_end_` with audio
async fn spawn_server() -> (String, mpsc::UnboundedReceiver<Value>, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let uri = Arc::new(Mutex::new(String::new()));
    let seen_uri = uri.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            *seen_uri.lock().unwrap() = req.uri().to_string();
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).unwrap();
            let is_end = frame["type"] == "_end_";
            frames_tx.send(frame).unwrap();

            if is_end {
                for reply in [
                    json!({ "type": "_start_", "messageId": "s1" }),
                    json!({ "type": "_data_", "messageId": "s1", "content": "QQ==" }),
                    json!({ "type": "_end_", "messageId": "s1" }),
                ] {
                    ws.send(Message::Text(reply.to_string())).await.unwrap();
                }
            }
        }
    });

    (endpoint, frames_rx, uri)
}

async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn answer_is_spoken_and_archived_for_replay() {
    let (endpoint, mut frames, uri) = spawn_server().await;

    let config = AudioConfig::default().with_endpoint(endpoint);
    let factory = MemorySinkFactory::new().with_latency(Duration::from_millis(2));
    let probe = factory.probe();
    let player = StreamPlayer::spawn(Arc::new(factory), &config);
    let connector = SignalingConnector::new(config, "sess-1", Some("tok".to_string()));
    let voice = Arc::new(connector.connect(player).await.unwrap());
    assert!(voice.is_connected());
    assert!(uri.lock().unwrap().contains("sessionId=sess-1&token=tok"));

    let requester = Arc::new(OneTurn(vec![
        envelope(json!({ "status": "START", "messageId": "m1" })),
        envelope(json!({ "content": "Hi" })),
        envelope(json!({ "content": " there" })),
    ]));
    let session_config = SessionConfig::default().with_voice(true).with_pace(1, 4);
    let mut session = ChatSession::new(requester, session_config).with_voice(voice.clone());

    let index = session.submit("hello").await.unwrap();
    assert_eq!(session.transcript().get(index).unwrap().content, "Hi there");

    let mut received = Vec::new();
    while received.len() < 4 {
        received.push(frames.recv().await.unwrap());
    }
    assert_eq!(received[0], json!({ "type": "_start_", "messageId": "m1" }));
    assert_eq!(
        received[1],
        json!({ "type": "_data_", "messageId": "m1", "content": "Hi" })
    );
    assert_eq!(received[2]["content"], " there");
    assert_eq!(received[3], json!({ "type": "_end_", "messageId": "m1" }));

    // Live playback of the server's audio
    settle(|| probe.ended() == 1).await;
    assert_eq!(probe.appended(), vec![b"A".to_vec()]);
    assert!(voice.has_audio("s1").await);

    // Replay from the archive
    voice.play("s1").await.unwrap();
    settle(|| probe.ended() == 2).await;
    assert_eq!(probe.appended(), vec![b"A".to_vec(), b"A".to_vec()]);

    voice.close().await;
    assert!(!voice.is_connected());
}

#[tokio::test]
async fn speak_message_requests_synthesis_then_replays() {
    let (endpoint, mut frames, _uri) = spawn_server().await;

    let config = AudioConfig::default().with_endpoint(endpoint);
    let factory = MemorySinkFactory::new();
    let probe = factory.probe();
    let player = StreamPlayer::spawn(Arc::new(factory), &config);
    let voice = SignalingConnector::new(config, "sess-2", None)
        .connect(player)
        .await
        .unwrap();

    let mut message = ChatMessage::assistant_placeholder();
    message.content = "Read me".to_string();
    message.session_ref = Some("s1".to_string());

    // No archived audio yet: synthesis is requested under the session ref
    let outcome = voice.speak_message(&message).await.unwrap();
    assert_eq!(outcome, flowchat_audio::SpeakOutcome::Requested("s1".to_string()));
    let start = frames.recv().await.unwrap();
    assert_eq!(start["type"], "_start_");
    let data = frames.recv().await.unwrap();
    assert_eq!(data["content"], "Read me");

    settle(|| probe.ended() == 1).await;

    // Archived now: replayed locally
    let outcome = voice.speak_message(&message).await.unwrap();
    assert_eq!(outcome, flowchat_audio::SpeakOutcome::Replayed("s1".to_string()));
    settle(|| probe.ended() == 2).await;
}
