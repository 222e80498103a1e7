//! Speaker sink (rodio)
//!
//! `rodio::OutputStream` is not `Send`, so each sink owns a dedicated thread
//! that opens the default output device and plays the chunks it receives.

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{AppendDone, MediaSink, SinkFactory};
use crate::error::{Error, Result};

const IDLE_CHECK: Duration = Duration::from_millis(50);

enum Command {
    Append(Vec<u8>, oneshot::Sender<Result<()>>),
    Play,
    End,
    Abort,
}

/// Creates speaker sinks on the default output device
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioSinkFactory;

impl SinkFactory for RodioSinkFactory {
    fn create(&self, mime_type: &str) -> Result<Box<dyn MediaSink>> {
        debug!(mime_type = %mime_type, "Opening speaker sink");
        Ok(Box::new(RodioSink::open()?))
    }
}

/// Streams appended audio to the speaker
pub struct RodioSink {
    commands: mpsc::Sender<Command>,
    ready: Arc<AtomicBool>,
    ready_rx: Option<oneshot::Receiver<()>>,
    updating: Arc<AtomicBool>,
}

impl RodioSink {
    /// Spawn the output thread
    pub fn open() -> Result<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let ready = Arc::new(AtomicBool::new(false));
        let updating = Arc::new(AtomicBool::new(false));

        let thread_ready = ready.clone();
        let thread_updating = updating.clone();
        std::thread::Builder::new()
            .name("flowchat-speaker".to_string())
            .spawn(move || run_output(rx, ready_tx, thread_ready, thread_updating))?;

        Ok(Self {
            commands,
            ready,
            ready_rx: Some(ready_rx),
            updating,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::AudioStream("speaker thread stopped".to_string()))
    }
}

impl MediaSink for RodioSink {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn ready_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.ready_rx.take()
    }

    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    fn append(&mut self, chunk: Vec<u8>) -> AppendDone {
        let (tx, rx) = oneshot::channel();
        self.updating.store(true, Ordering::SeqCst);
        if let Err(mpsc::SendError(Command::Append(_, tx))) = self.commands.send(Command::Append(chunk, tx)) {
            self.updating.store(false, Ordering::SeqCst);
            let _ = tx.send(Err(Error::Append("speaker thread stopped".to_string())));
        }
        rx
    }

    fn play(&mut self) -> Result<()> {
        self.send(Command::Play)
    }

    fn end_of_stream(&mut self) -> Result<()> {
        self.send(Command::End)
    }

    fn abort(&mut self) -> Result<()> {
        self.send(Command::Abort)
    }
}

fn run_output(
    rx: mpsc::Receiver<Command>,
    ready_tx: oneshot::Sender<()>,
    ready: Arc<AtomicBool>,
    updating: Arc<AtomicBool>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "Failed to open output device");
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to create speaker sink");
            return;
        }
    };
    sink.pause();

    ready.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(());
    info!("Speaker sink ready");

    // MP3 frames can straddle chunk boundaries; undecodable bytes wait for more
    let mut pending: Vec<u8> = Vec::new();
    let mut ended = false;

    loop {
        match rx.recv_timeout(IDLE_CHECK) {
            Ok(Command::Append(chunk, done)) => {
                pending.extend_from_slice(&chunk);
                if decode_into(&sink, &pending) {
                    pending.clear();
                }
                updating.store(false, Ordering::SeqCst);
                let _ = done.send(Ok(()));
            }
            Ok(Command::Play) => sink.play(),
            Ok(Command::End) => {
                if !pending.is_empty() && !decode_into(&sink, &pending) {
                    warn!(bytes = pending.len(), "Trailing audio could not be decoded");
                }
                pending.clear();
                ended = true;
            }
            Ok(Command::Abort) => {
                sink.stop();
                debug!("Speaker sink aborted");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if ended && sink.empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if ended {
                    sink.sleep_until_end();
                } else {
                    sink.stop();
                }
                break;
            }
        }
    }
    debug!("Speaker thread finished");
}

fn decode_into(sink: &Sink, bytes: &[u8]) -> bool {
    match Decoder::new(Cursor::new(bytes.to_vec())) {
        Ok(source) => {
            sink.append(source);
            true
        }
        Err(e) => {
            debug!(error = %e, bytes = bytes.len(), "Audio not decodable yet");
            false
        }
    }
}
