//! Stream player
//!
//! A single actor task owns the buffer queue, the current sink and the
//! in-flight append. Every playback operation is a command sent through a
//! [`PlayerHandle`], so appends reach the sink in arrival order with at most
//! one outstanding at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::queue::AudioBufferQueue;
use crate::sink::{wait_ready, AppendDone, MediaSink, SinkFactory};

enum Command {
    StartStream,
    Append(Vec<u8>),
    EndStream,
    PlayBuffer(Vec<u8>),
    Stop,
}

/// Cloneable handle to the player task
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    playing: watch::Receiver<bool>,
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("playing", &*self.playing.borrow())
            .finish()
    }
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::PlayerGone)
    }

    /// Tear down any current pipeline and open a fresh one
    pub fn start_stream(&self) -> Result<()> {
        self.send(Command::StartStream)
    }

    /// Queue a decoded audio chunk
    pub fn append_audio_data(&self, chunk: Vec<u8>) -> Result<()> {
        self.send(Command::Append(chunk))
    }

    /// Finish the stream once everything queued has been appended
    pub fn end_stream(&self) -> Result<()> {
        self.send(Command::EndStream)
    }

    /// Play a complete buffer through a fresh pipeline
    pub fn play_buffer(&self, buffer: Vec<u8>) -> Result<()> {
        self.send(Command::PlayBuffer(buffer))
    }

    /// Halt playback and clear the queue; never fails
    pub fn stop(&self) {
        if self.send(Command::Stop).is_err() {
            debug!("Stop ignored, player task already gone");
        }
    }

    /// Whether audio is playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        *self.playing.borrow()
    }

    /// Playing-state notifications
    #[must_use]
    pub fn subscribe_playing(&self) -> watch::Receiver<bool> {
        self.playing.clone()
    }
}

/// Player task state
pub struct StreamPlayer {
    factory: Arc<dyn SinkFactory>,
    mime_type: String,
    poll_every: Duration,
    ready_timeout: Duration,
    sink: Option<Box<dyn MediaSink>>,
    queue: AudioBufferQueue,
    in_flight: Option<AppendDone>,
    end_requested: bool,
    deferred: Option<Command>,
    playing: watch::Sender<bool>,
}

impl StreamPlayer {
    /// Spawn the player task and return its handle
    pub fn spawn(factory: Arc<dyn SinkFactory>, config: &AudioConfig) -> PlayerHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let (playing, playing_rx) = watch::channel(false);

        let player = Self {
            factory,
            mime_type: config.mime_type.clone(),
            poll_every: config.ready_poll_interval(),
            ready_timeout: config.ready_timeout(),
            sink: None,
            queue: AudioBufferQueue::new(),
            in_flight: None,
            end_requested: false,
            deferred: None,
            playing,
        };
        tokio::spawn(player.run(rx));

        PlayerHandle {
            commands,
            playing: playing_rx,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("Player task started");
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command, &mut rx).await,
                    None => break,
                },
                result = wait_append(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.on_append_done(result);
                }
            }
            // A start or replay that arrived while a sink was getting ready
            while let Some(command) = self.deferred.take() {
                self.handle(command, &mut rx).await;
            }
        }
        self.teardown();
        debug!("Player task stopped");
    }

    async fn handle(&mut self, command: Command, rx: &mut mpsc::UnboundedReceiver<Command>) {
        match command {
            Command::StartStream => {
                self.open_pipeline(rx).await;
            }
            Command::Append(chunk) => {
                if self.sink.is_none() {
                    debug!(bytes = chunk.len(), "No open pipeline, audio chunk dropped");
                    return;
                }
                self.queue.enqueue(chunk);
                self.drain();
            }
            Command::EndStream => {
                self.end_requested = true;
                self.maybe_finish();
            }
            Command::PlayBuffer(buffer) => {
                if !self.open_pipeline(rx).await {
                    return;
                }
                self.queue.enqueue(buffer);
                self.end_requested = true;
                self.drain();
            }
            Command::Stop => {
                self.teardown();
                info!("Playback stopped");
            }
        }
    }

    /// Replace the current pipeline; returns whether the new sink is usable
    ///
    /// Commands keep being served while the sink gets ready: appends and the
    /// end marker are queued for it, `Stop` abandons it, and a new start or
    /// replay abandons it and is handled next.
    async fn open_pipeline(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) -> bool {
        self.teardown();

        let mut sink = match self.factory.create(&self.mime_type) {
            Ok(sink) => sink,
            Err(e) => {
                warn!(error = %e, "Failed to open media sink");
                return false;
            }
        };

        let ready = {
            let ready = wait_ready(sink.as_mut(), self.poll_every, self.ready_timeout);
            tokio::pin!(ready);
            loop {
                tokio::select! {
                    result = &mut ready => break Some(result),
                    command = rx.recv() => match command {
                        Some(Command::Append(chunk)) => self.queue.enqueue(chunk),
                        Some(Command::EndStream) => self.end_requested = true,
                        Some(command @ (Command::StartStream | Command::PlayBuffer(_))) => {
                            self.deferred = Some(command);
                            break None;
                        }
                        Some(Command::Stop) | None => break None,
                    },
                }
            }
        };

        match ready {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!(error = %e, "Media sink never became ready, pipeline abandoned");
                self.teardown();
                return false;
            }
            None => {
                if let Err(e) = sink.abort() {
                    debug!(error = %e, "Sink abort failed, ignored");
                }
                self.teardown();
                info!("Pipeline abandoned before the sink was ready");
                return false;
            }
        }

        if let Err(e) = sink.play() {
            warn!(error = %e, "Playback start failed");
        }
        self.sink = Some(sink);
        self.set_playing(true);
        debug!("Playback pipeline ready");

        self.drain();
        self.maybe_finish();
        true
    }

    fn drain(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if self.in_flight.is_some() {
            return;
        }
        if let Some(chunk) = self.queue.next_ready(sink.is_updating()) {
            debug!(bytes = chunk.len(), pending = self.queue.len(), "Appending audio chunk");
            self.in_flight = Some(sink.append(chunk));
        }
    }

    fn on_append_done(&mut self, result: Result<()>) {
        self.in_flight = None;
        self.queue.complete();
        if let Err(e) = result {
            warn!(error = %e, "Audio append failed, continuing with next chunk");
        }
        self.drain();
        self.maybe_finish();
    }

    fn maybe_finish(&mut self) {
        if !self.end_requested || !self.queue.is_drained() || self.in_flight.is_some() {
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        self.end_requested = false;
        if let Err(e) = sink.end_of_stream() {
            warn!(error = %e, "Failed to end media stream");
        }
        self.set_playing(false);
        info!("Playback stream ended");
    }

    fn teardown(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.abort() {
                debug!(error = %e, "Sink abort failed, ignored");
            }
        }
        self.queue.clear();
        self.in_flight = None;
        self.end_requested = false;
        self.set_playing(false);
    }

    fn set_playing(&self, playing: bool) {
        self.playing.send_if_modified(|current| {
            if *current == playing {
                return false;
            }
            *current = playing;
            true
        });
    }
}

async fn wait_append(slot: &mut Option<AppendDone>) -> Result<()> {
    match slot.as_mut() {
        Some(done) => done
            .await
            .unwrap_or_else(|_| Err(Error::Append("sink dropped the append".to_string()))),
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemoryProbe, MemorySinkFactory};

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("player did not settle");
    }

    fn spawn(factory: MemorySinkFactory) -> (PlayerHandle, MemoryProbe) {
        let probe = factory.probe();
        let handle = StreamPlayer::spawn(Arc::new(factory), &AudioConfig::default());
        (handle, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_in_order_without_overlap() {
        let (player, probe) =
            spawn(MemorySinkFactory::new().with_latency(Duration::from_millis(20)));

        player.start_stream().unwrap();
        player.append_audio_data(b"c1".to_vec()).unwrap();
        player.append_audio_data(b"c2".to_vec()).unwrap();
        player.append_audio_data(b"c3".to_vec()).unwrap();
        player.end_stream().unwrap();

        settle(|| probe.ended() == 1).await;
        assert_eq!(
            probe.appended(),
            vec![b"c1".to_vec(), b"c2".to_vec(), b"c3".to_vec()]
        );
        assert_eq!(probe.overlaps(), 0);
        assert_eq!(probe.played(), 1);
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_append_does_not_block_queue() {
        let (player, probe) = spawn(MemorySinkFactory::new());
        probe.fail_next_appends(1);

        player.start_stream().unwrap();
        player.append_audio_data(vec![1]).unwrap();
        player.append_audio_data(vec![2]).unwrap();
        player.end_stream().unwrap();

        settle(|| probe.ended() == 1).await;
        assert_eq!(probe.appended(), vec![vec![1], vec![2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_append() {
        let (player, probe) =
            spawn(MemorySinkFactory::new().with_latency(Duration::from_millis(50)));
        let mut playing = player.subscribe_playing();

        player.start_stream().unwrap();
        player.append_audio_data(vec![1]).unwrap();
        player.append_audio_data(vec![2]).unwrap();
        playing.wait_for(|p| *p).await.unwrap();

        player.stop();
        settle(|| probe.aborted() == 1).await;
        assert_eq!(probe.appended(), vec![vec![1]]);
        assert!(!player.is_playing());

        // Stopping again from idle is harmless
        player.stop();
        player.start_stream().unwrap();
        player.append_audio_data(vec![3]).unwrap();
        settle(|| probe.appended().len() == 2).await;
        assert_eq!(probe.sinks_created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_buffer_single_append() {
        let (player, probe) = spawn(MemorySinkFactory::new().with_ready_signal(true));

        player.play_buffer(vec![0x41]).unwrap();

        settle(|| probe.ended() == 1).await;
        assert_eq!(probe.appended(), vec![vec![0x41]]);
        assert_eq!(probe.sinks_created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unready_sink_is_abandoned() {
        let (player, probe) =
            spawn(MemorySinkFactory::new().with_ready_delay(Duration::from_secs(60)));

        player.start_stream().unwrap();
        player.append_audio_data(vec![1]).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(probe.appended().is_empty());
        assert_eq!(probe.played(), 0);
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_after_stop_is_dropped() {
        let (player, probe) = spawn(MemorySinkFactory::new());
        let mut playing = player.subscribe_playing();

        player.start_stream().unwrap();
        playing.wait_for(|p| *p).await.unwrap();
        player.stop();
        player.append_audio_data(vec![9]).unwrap();

        player.start_stream().unwrap();
        player.append_audio_data(vec![1]).unwrap();
        player.end_stream().unwrap();

        settle(|| probe.ended() == 1).await;
        assert_eq!(probe.appended(), vec![vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_waiting_for_ready() {
        let (player, probe) =
            spawn(MemorySinkFactory::new().with_ready_delay(Duration::from_secs(60)));

        player.start_stream().unwrap();
        player.append_audio_data(vec![1]).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(probe.sinks_created(), 1);

        player.stop();
        player.start_stream().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The second pipeline opened without waiting out the first timeout
        assert_eq!(probe.sinks_created(), 2);
        assert_eq!(probe.aborted(), 1);
        assert!(probe.appended().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_queued_while_sink_gets_ready() {
        let (player, probe) =
            spawn(MemorySinkFactory::new().with_ready_delay(Duration::from_millis(30)));

        player.start_stream().unwrap();
        player.append_audio_data(b"c1".to_vec()).unwrap();
        player.append_audio_data(b"c2".to_vec()).unwrap();
        player.end_stream().unwrap();

        settle(|| probe.ended() == 1).await;
        assert_eq!(probe.appended(), vec![b"c1".to_vec(), b"c2".to_vec()]);
        assert_eq!(probe.overlaps(), 0);
    }
}
