//! Event accumulation state machine
//!
//! Tracks which logical event kind is open across chunk boundaries and what
//! has been accumulated for it. A kind switch always yields the completion of
//! the previous kind before the progress of the new one.

use tracing::debug;

use crate::event::{EventKind, StreamEvent};

/// Output of feeding the accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A chunk arrived for the active kind
    Progress {
        /// Active kind
        kind: EventKind,
        /// The chunk itself
        event: StreamEvent,
        /// Everything accumulated for this kind so far, including this chunk
        accumulated: String,
    },
    /// The active kind ended (kind switch or end of stream)
    Complete {
        /// Kind that ended
        kind: EventKind,
        /// Final accumulated content
        accumulated: String,
        /// Distinct event ids seen during this run, in arrival order
        event_ids: Vec<String>,
    },
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating {
        kind: EventKind,
        buffer: String,
        event_ids: Vec<String>,
    },
}

/// Accumulates streamed events per kind
#[derive(Debug, Default)]
pub struct EventAccumulator {
    state: State,
}

impl EventAccumulator {
    /// Create an idle accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open kind
    #[must_use]
    pub fn active_kind(&self) -> Option<&EventKind> {
        match &self.state {
            State::Idle => None,
            State::Accumulating { kind, .. } => Some(kind),
        }
    }

    /// Content accumulated for the open kind
    #[must_use]
    pub fn buffer(&self) -> &str {
        match &self.state {
            State::Idle => "",
            State::Accumulating { buffer, .. } => buffer,
        }
    }

    /// Feed one event
    ///
    /// Returns at most two transitions: the completion of the previous kind
    /// (on a kind switch) followed by the progress of the incoming event.
    pub fn accept(&mut self, event: StreamEvent) -> Vec<Transition> {
        let mut transitions = Vec::with_capacity(2);

        let same_kind = matches!(&self.state, State::Accumulating { kind, .. } if *kind == event.kind);
        if !same_kind {
            if let Some(complete) = self.close() {
                transitions.push(complete);
            }
            self.state = State::Accumulating {
                kind: event.kind.clone(),
                buffer: String::new(),
                event_ids: Vec::new(),
            };
        }

        if let State::Accumulating {
            kind,
            buffer,
            event_ids,
        } = &mut self.state
        {
            // The visible answer text is owned by the typewriter, not the buffer
            if !kind.is_content() {
                buffer.push_str(event.content());
            }
            if let Some(id) = event.event_id() {
                if !event_ids.iter().any(|seen| seen == id) {
                    event_ids.push(id.to_string());
                }
            }

            transitions.push(Transition::Progress {
                kind: kind.clone(),
                accumulated: buffer.clone(),
                event,
            });
        }

        transitions
    }

    /// Signal end of stream
    pub fn finish(&mut self) -> Option<Transition> {
        self.close()
    }

    /// Drop any open kind without emitting a completion
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    fn close(&mut self) -> Option<Transition> {
        match std::mem::take(&mut self.state) {
            State::Idle => None,
            State::Accumulating {
                kind,
                buffer,
                event_ids,
            } => {
                debug!(kind = %kind, len = buffer.len(), "Event kind completed");
                Some(Transition::Complete {
                    kind,
                    accumulated: buffer,
                    event_ids,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completions(transitions: &[Transition]) -> Vec<(EventKind, String)> {
        transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Complete {
                    kind, accumulated, ..
                } => Some((kind.clone(), accumulated.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_idle_to_accumulating() {
        let mut acc = EventAccumulator::new();
        let out = acc.accept(StreamEvent::new("thinking", "a"));
        assert_eq!(out.len(), 1);
        assert_eq!(acc.active_kind(), Some(&EventKind::Thinking));
        assert_eq!(acc.buffer(), "a");
    }

    #[test]
    fn test_kind_transition_completes_once() {
        let mut acc = EventAccumulator::new();
        let mut all = Vec::new();
        all.extend(acc.accept(StreamEvent::new("content", "Hi")));
        all.extend(acc.accept(StreamEvent::new("thinking", "a")));
        all.extend(acc.accept(StreamEvent::new("thinking", "b")));
        let switch = acc.accept(StreamEvent::new("content", "!"));
        all.extend(switch.clone());

        // Completion precedes the new kind's progress
        assert!(matches!(switch[0], Transition::Complete { .. }));
        assert!(matches!(switch[1], Transition::Progress { .. }));

        let thinking: Vec<_> = completions(&all)
            .into_iter()
            .filter(|(k, _)| *k == EventKind::Thinking)
            .collect();
        assert_eq!(thinking, vec![(EventKind::Thinking, "ab".to_string())]);
    }

    #[test]
    fn test_content_does_not_accumulate() {
        let mut acc = EventAccumulator::new();
        acc.accept(StreamEvent::new("content", "Hi"));
        acc.accept(StreamEvent::new("content", " there"));
        assert_eq!(acc.buffer(), "");
    }

    #[test]
    fn test_finish_flushes_open_kind() {
        let mut acc = EventAccumulator::new();
        acc.accept(StreamEvent::new("thought", "x").with_metadata_id("t1"));
        acc.accept(StreamEvent::new("thought", "y").with_metadata_id("t1"));

        match acc.finish() {
            Some(Transition::Complete {
                kind,
                accumulated,
                event_ids,
            }) => {
                assert_eq!(kind, EventKind::Thought);
                assert_eq!(accumulated, "xy");
                assert_eq!(event_ids, vec!["t1".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(acc.active_kind().is_none());
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_buffer_reset_on_switch() {
        let mut acc = EventAccumulator::new();
        acc.accept(StreamEvent::new("thinking", "long reasoning"));
        acc.accept(StreamEvent::new("toolCalling", "call"));
        assert_eq!(acc.buffer(), "call");
    }
}
