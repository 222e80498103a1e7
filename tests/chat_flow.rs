//! End-to-end chat turns against a scripted response stream

use async_trait::async_trait;
use bytes::Bytes;
use flowchat_core::{
    ByteStream, ChatMessage, ChatRequester, ChatSession, Error, EventData, EventHandler,
    EventKind, HandlerOutcome, JsonFileMirror, RenderSink, Result, SessionConfig, SessionView,
    ThoughtStatus, TranscriptMirror,
};
use futures::StreamExt;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Serves one scripted chunk list per request
#[derive(Default)]
struct ScriptedRequester {
    turns: Mutex<VecDeque<Vec<std::result::Result<String, String>>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedRequester {
    fn with_turns(turns: Vec<Vec<String>>) -> Arc<Self> {
        let requester = Self::default();
        for turn in turns {
            requester.push_turn(turn.into_iter().map(Ok).collect());
        }
        Arc::new(requester)
    }

    fn push_turn(&self, chunks: Vec<std::result::Result<String, String>>) {
        self.turns.lock().unwrap().push_back(chunks);
    }

    fn request_sizes(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl ChatRequester for ScriptedRequester {
    async fn request(&self, transcript: &[ChatMessage]) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(transcript.to_vec());
        let chunks = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Request("no scripted turn".to_string()))?;

        let items: Vec<Result<Bytes>> = chunks
            .into_iter()
            .map(|chunk| match chunk {
                Ok(text) => Ok(Bytes::from(text)),
                Err(reason) => Err(Error::stream_read(reason)),
            })
            .collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

fn envelope(event: Option<&str>, data: serde_json::Value) -> String {
    match event {
        Some(event) => json!({ "event": event, "data": data.to_string() }).to_string(),
        None => json!({ "data": data.to_string() }).to_string(),
    }
}

fn content(text: &str) -> String {
    envelope(None, json!({ "content": text }))
}

fn thought(id: &str, title: &str, text: &str) -> String {
    envelope(
        Some("thought"),
        json!({ "content": text, "metadataMap": { "id": id, "chainTitle": title } }),
    )
}

#[tokio::test(start_paused = true)]
async fn hello_streams_hi_there() {
    let requester = ScriptedRequester::with_turns(vec![vec![content("Hi"), content(" there")]]);
    let mut session = ChatSession::new(requester.clone(), SessionConfig::default());

    let index = session.submit("hello").await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.get(0).unwrap().content, "hello");
    let answer = transcript.get(index).unwrap();
    assert_eq!(answer.content, "Hi there");
    assert!(!answer.loading);
    assert!(answer.thought_chain.is_empty());
    assert_eq!(requester.request_sizes(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn thought_chain_entry_updated_in_place() {
    let requester = ScriptedRequester::with_turns(vec![vec![
        thought("t1", "Plan", "step1"),
        thought("t1", "Plan", "-done"),
        content("Answer"),
    ]]);
    let mut session = ChatSession::new(requester, SessionConfig::default());

    let index = session.submit("q").await.unwrap();

    let answer = session.transcript().get(index).unwrap();
    assert_eq!(answer.thought_chain.len(), 1);
    let item = answer.thought_chain.get("t1").unwrap();
    assert_eq!(item.title, "Plan");
    assert_eq!(item.content, "step1-done");
    assert_eq!(item.status, ThoughtStatus::Done);
    assert_eq!(answer.content, "Answer");
}

#[tokio::test(start_paused = true)]
async fn thought_completed_at_end_of_stream() {
    let requester = ScriptedRequester::with_turns(vec![vec![
        content("Looking"),
        thought("t9", "Search", "query"),
    ]]);
    let mut session = ChatSession::new(requester, SessionConfig::default());

    let index = session.submit("q").await.unwrap();

    let answer = session.transcript().get(index).unwrap();
    assert_eq!(answer.thought_chain.get("t9").unwrap().status, ThoughtStatus::Done);
    assert_eq!(answer.content, "Looking");
}

#[tokio::test(start_paused = true)]
async fn regenerate_appends_malformed_chunk_verbatim() {
    let requester = ScriptedRequester::with_turns(vec![
        vec![content("first")],
        vec![content("Hi"), "oops{".to_string()],
    ]);
    let mut session = ChatSession::new(requester.clone(), SessionConfig::default());

    let first = session.submit("q").await.unwrap();
    let second = session.regenerate(first).await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript.get(first).unwrap().content, "first");
    assert_eq!(transcript.get(second - 1).unwrap().content, "q");
    assert_eq!(transcript.get(second).unwrap().content, "Hioops{");
    assert_eq!(requester.request_sizes(), vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn stream_failure_keeps_partial_and_clears_flags() {
    let requester = Arc::new(ScriptedRequester::default());
    requester.push_turn(vec![
        Ok(content("partial answer")),
        Err("connection reset".to_string()),
    ]);
    let mut session = ChatSession::new(requester, SessionConfig::default());

    let err = session.submit("q").await.unwrap_err();

    assert_eq!(err.code(), "stream_read_failure");
    assert!(!session.is_sending());
    assert!(!session.is_streaming());
    let answer = session.transcript().get(1).unwrap();
    assert!(!answer.loading);
    // Text received before the failure is kept even if no tick revealed it yet
    assert_eq!(answer.content, "partial answer");
}

#[derive(Default)]
struct InterceptThinking {
    completions: Mutex<Vec<String>>,
}

#[async_trait]
impl EventHandler for InterceptThinking {
    async fn on_progress(
        &self,
        kind: &EventKind,
        _data: &EventData,
        _view: &mut SessionView<'_>,
    ) -> Result<HandlerOutcome> {
        if *kind == EventKind::Thinking {
            return Ok(HandlerOutcome::handled());
        }
        Ok(HandlerOutcome::declined())
    }

    async fn on_complete(
        &self,
        kind: &EventKind,
        data: &EventData,
        view: &mut SessionView<'_>,
    ) -> Result<HandlerOutcome> {
        if *kind != EventKind::Thinking {
            return Ok(HandlerOutcome::declined());
        }
        self.completions
            .lock()
            .unwrap()
            .push(data.accumulated_content.clone());
        if let Some(message) = view.transcript.last_assistant_mut() {
            message.thought_chain.upsert("custom", Some("Reasoning"), &data.content);
        }
        Ok(HandlerOutcome::handled())
    }
}

#[tokio::test(start_paused = true)]
async fn custom_handler_replaces_default_processing() {
    let thinking = |text: &str| envelope(Some("thinking"), json!({ "content": text, "id": "k" }));
    let requester = ScriptedRequester::with_turns(vec![vec![
        content("Hi"),
        thinking("a"),
        thinking("b"),
        content("!"),
    ]]);
    let handler = Arc::new(InterceptThinking::default());
    let mut session =
        ChatSession::new(requester, SessionConfig::default()).with_handler(handler.clone());

    let index = session.submit("q").await.unwrap();

    assert_eq!(*handler.completions.lock().unwrap(), vec!["ab".to_string()]);
    let answer = session.transcript().get(index).unwrap();
    assert!(answer.thought_chain.get("k").is_none());
    assert_eq!(answer.thought_chain.get("custom").unwrap().content, "ab");
    assert_eq!(answer.content, "Hi!");
}

struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    async fn on_progress(
        &self,
        _kind: &EventKind,
        _data: &EventData,
        _view: &mut SessionView<'_>,
    ) -> Result<HandlerOutcome> {
        Err(Error::handler("plugin crashed"))
    }
}

#[tokio::test(start_paused = true)]
async fn failing_handler_falls_back_to_default() {
    let requester =
        ScriptedRequester::with_turns(vec![vec![thought("t1", "Plan", "x"), content("ok")]]);
    let mut session =
        ChatSession::new(requester, SessionConfig::default()).with_handler(Arc::new(FailingHandler));

    let index = session.submit("q").await.unwrap();

    let answer = session.transcript().get(index).unwrap();
    assert_eq!(answer.thought_chain.get("t1").unwrap().content, "x");
    assert_eq!(answer.content, "ok");
}

#[tokio::test(start_paused = true)]
async fn transcript_is_mirrored_and_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chats.json");
    let requester = ScriptedRequester::with_turns(vec![vec![content("Final Answer: 42")]]);

    let mut session = ChatSession::new(requester.clone(), SessionConfig::default())
        .with_mirror(Arc::new(JsonFileMirror::new(&path)));
    session.submit("meaning?").await.unwrap();

    let stored = JsonFileMirror::new(&path).load().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].content, "42");
    assert!(!stored[1].loading);

    let mut restored = ChatSession::new(requester, SessionConfig::default())
        .with_mirror(Arc::new(JsonFileMirror::new(&path)));
    assert_eq!(restored.restore().unwrap(), 2);

    restored.clear().unwrap();
    assert!(restored.transcript().is_empty());
    assert!(!path.exists());
}

#[derive(Clone, Default)]
struct Recorder {
    frames: Arc<Mutex<Vec<(usize, String)>>>,
    finished: Arc<Mutex<Vec<usize>>>,
}

impl RenderSink for Recorder {
    fn message_changed(&mut self, index: usize, message: &ChatMessage) {
        self.frames
            .lock()
            .unwrap()
            .push((index, message.content.clone()));
    }

    fn turn_finished(&mut self, index: usize, _message: &ChatMessage) {
        self.finished.lock().unwrap().push(index);
    }
}

#[tokio::test(start_paused = true)]
async fn reveal_frames_grow_monotonically() {
    let requester = ScriptedRequester::with_turns(vec![vec![content("abcdefgh")]]);
    let recorder = Recorder::default();
    let mut session = ChatSession::new(requester, SessionConfig::default())
        .with_render(Box::new(recorder.clone()));

    let index = session.submit("q").await.unwrap();

    let frames: Vec<String> = recorder
        .frames
        .lock()
        .unwrap()
        .iter()
        .filter(|(i, _)| *i == index)
        .map(|(_, text)| text.clone())
        .collect();
    assert_eq!(frames.last().map(String::as_str), Some("abcdefgh"));
    for pair in frames.windows(2) {
        assert!(pair[1].starts_with(pair[0].as_str()));
    }
    assert_eq!(*recorder.finished.lock().unwrap(), vec![index]);
}
