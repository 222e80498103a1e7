//! In-memory sink
//!
//! Takes appended audio instead of playing it. Tests use a recording factory
//! whose shared [`MemoryProbe`] keeps every chunk; headless runs use
//! [`MemorySinkFactory::discarding`], which only counts them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{AppendDone, MediaSink, SinkFactory};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct ProbeState {
    appended: Vec<Vec<u8>>,
    bytes: usize,
    overlaps: usize,
    created: usize,
    played: usize,
    ended: usize,
    aborted: usize,
    fail_next: usize,
}

/// Observer shared by all sinks of a factory
#[derive(Debug, Clone, Default)]
pub struct MemoryProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl MemoryProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every appended chunk, in append order
    #[must_use]
    pub fn appended(&self) -> Vec<Vec<u8>> {
        self.lock().appended.clone()
    }

    /// Total bytes appended, recorded or not
    #[must_use]
    pub fn bytes_appended(&self) -> usize {
        self.lock().bytes
    }

    /// Appends started while another one was still in flight
    #[must_use]
    pub fn overlaps(&self) -> usize {
        self.lock().overlaps
    }

    /// Sinks created so far
    #[must_use]
    pub fn sinks_created(&self) -> usize {
        self.lock().created
    }

    /// `play` calls
    #[must_use]
    pub fn played(&self) -> usize {
        self.lock().played
    }

    /// `end_of_stream` calls
    #[must_use]
    pub fn ended(&self) -> usize {
        self.lock().ended
    }

    /// `abort` calls
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.lock().aborted
    }

    /// Make the next `count` appends fail
    pub fn fail_next_appends(&self, count: usize) {
        self.lock().fail_next = count;
    }
}

/// Creates [`MemorySink`]s sharing one probe
#[derive(Debug, Clone)]
pub struct MemorySinkFactory {
    probe: MemoryProbe,
    latency: Duration,
    ready_delay: Duration,
    ready_signal: bool,
    record: bool,
}

impl Default for MemorySinkFactory {
    fn default() -> Self {
        Self {
            probe: MemoryProbe::default(),
            latency: Duration::ZERO,
            ready_delay: Duration::ZERO,
            ready_signal: false,
            record: true,
        }
    }
}

impl MemorySinkFactory {
    /// Recording factory for sinks that are ready at once and append instantly
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose sinks drop audio after counting it
    #[must_use]
    pub fn discarding() -> Self {
        Self {
            record: false,
            ..Self::default()
        }
    }

    /// Time each append takes to complete
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Time until a new sink becomes ready
    #[must_use]
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Offer a readiness notification instead of being polled
    #[must_use]
    pub fn with_ready_signal(mut self, enabled: bool) -> Self {
        self.ready_signal = enabled;
        self
    }

    /// Shared probe
    #[must_use]
    pub fn probe(&self) -> MemoryProbe {
        self.probe.clone()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(&self, _mime_type: &str) -> Result<Box<dyn MediaSink>> {
        self.probe.lock().created += 1;
        Ok(Box::new(MemorySink {
            probe: self.probe.clone(),
            latency: self.latency,
            record: self.record,
            ready_at: Instant::now() + self.ready_delay,
            signal_offered: !self.ready_signal,
            updating: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// Sink that takes appended audio without playing it
#[derive(Debug)]
pub struct MemorySink {
    probe: MemoryProbe,
    latency: Duration,
    record: bool,
    ready_at: Instant,
    signal_offered: bool,
    updating: Arc<AtomicBool>,
}

impl MediaSink for MemorySink {
    fn is_ready(&self) -> bool {
        Instant::now() >= self.ready_at
    }

    fn ready_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        if self.signal_offered {
            return None;
        }
        self.signal_offered = true;

        let (tx, rx) = oneshot::channel();
        let ready_at = self.ready_at;
        tokio::spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            let _ = tx.send(());
        });
        Some(rx)
    }

    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    fn append(&mut self, chunk: Vec<u8>) -> AppendDone {
        let fail = {
            let mut state = self.probe.lock();
            if self.updating.load(Ordering::SeqCst) {
                state.overlaps += 1;
            }
            state.bytes += chunk.len();
            if self.record {
                state.appended.push(chunk);
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                true
            } else {
                false
            }
        };
        self.updating.store(true, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let updating = self.updating.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            updating.store(false, Ordering::SeqCst);
            let result = if fail {
                Err(Error::Append("sink rejected chunk".to_string()))
            } else {
                Ok(())
            };
            let _ = tx.send(result);
        });
        rx
    }

    fn play(&mut self) -> Result<()> {
        self.probe.lock().played += 1;
        Ok(())
    }

    fn end_of_stream(&mut self) -> Result<()> {
        self.probe.lock().ended += 1;
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.probe.lock().aborted += 1;
        self.updating.store(false, Ordering::SeqCst);
        Ok(())
    }
}
