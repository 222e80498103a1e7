//! Typewriter reveal scheduling
//!
//! Separates what has been received (`target`) from what is shown
//! (`revealed`). A fixed-interval tick moves `revealed` forward by a few
//! characters at a time, or straight to `target` once the stream finished.

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::warn;

/// Default reveal tick
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Default characters revealed per tick
pub const DEFAULT_STEP: usize = 2;

/// Reveals accumulated text at a controlled rate
#[derive(Debug)]
pub struct TypewriterScheduler {
    target: String,
    revealed_len: usize,
    step: usize,
    finished: bool,
    tick_every: Duration,
    ticker: Option<Interval>,
}

impl Default for TypewriterScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, DEFAULT_STEP)
    }
}

impl TypewriterScheduler {
    /// Create a scheduler
    #[must_use]
    pub fn new(tick_every: Duration, step: usize) -> Self {
        Self {
            target: String::new(),
            revealed_len: 0,
            step: step.max(1),
            finished: false,
            tick_every,
            ticker: None,
        }
    }

    /// Accept a content delta
    ///
    /// A delta that `target` already ends with is an upstream retransmission
    /// and is discarded. Returns whether the delta was accepted.
    pub fn push(&mut self, delta: &str) -> bool {
        if delta.is_empty() {
            return false;
        }
        if self.target.ends_with(delta) {
            warn!(delta = %delta, "Duplicate content delta skipped");
            return false;
        }
        self.target.push_str(delta);
        true
    }

    /// Append text verbatim, bypassing the duplicate check
    pub fn append_raw(&mut self, text: &str) {
        self.target.push_str(text);
    }

    /// Mark the stream as finished; the next tick reveals everything
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Whether the stream finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Everything accepted so far
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Text currently shown
    #[must_use]
    pub fn revealed(&self) -> &str {
        &self.target[..self.revealed_len]
    }

    /// Whether `revealed == target`
    #[must_use]
    pub fn is_caught_up(&self) -> bool {
        self.revealed_len == self.target.len()
    }

    /// Move `revealed` forward one step; returns whether it changed
    pub fn advance(&mut self) -> bool {
        if self.is_caught_up() {
            return false;
        }

        self.revealed_len = if self.finished {
            self.target.len()
        } else {
            self.target[self.revealed_len..]
                .char_indices()
                .nth(self.step)
                .map(|(offset, _)| self.revealed_len + offset)
                .unwrap_or(self.target.len())
        };
        true
    }

    /// Wait for the next tick of the reveal timer
    pub async fn tick(&mut self) {
        let tick_every = self.tick_every;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(tick_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }

    /// Keep ticking until everything is revealed, reporting each new frame
    pub async fn when_caught_up<F>(&mut self, mut on_frame: F)
    where
        F: FnMut(&str),
    {
        while !self.is_caught_up() {
            self.tick().await;
            if self.advance() {
                on_frame(self.revealed());
            }
        }
    }
}
