//! Terminal renderer
//!
//! Prints newly revealed answer text as it appears and one line per thought
//! chain entry when it starts and when it finishes.

use flowchat_core::{ChatMessage, RenderSink, ThoughtStatus};
use std::collections::HashMap;
use std::io::Write;

/// Writes the transcript to a terminal
pub struct TerminalRender<W: Write + Send> {
    out: W,
    printed: HashMap<usize, usize>,
    thoughts: HashMap<(usize, String), ThoughtStatus>,
}

impl TerminalRender<std::io::Stdout> {
    /// Render to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalRender<W> {
    /// Render to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashMap::new(),
            thoughts: HashMap::new(),
        }
    }

    fn write(&mut self, text: &str) {
        // A closed terminal is not worth failing a chat turn over
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> RenderSink for TerminalRender<W> {
    fn message_changed(&mut self, index: usize, message: &ChatMessage) {
        if !message.is_assistant() {
            return;
        }
        let printed = self.printed.get(&index).copied().unwrap_or(0);
        // Finalization may shorten the text; the printed prefix stays as is
        let Some(suffix) = message.content.get(printed..) else {
            return;
        };
        if suffix.is_empty() || !message.content.is_char_boundary(printed) {
            return;
        }
        let suffix = suffix.to_string();
        self.printed.insert(index, message.content.len());
        self.write(&suffix);
    }

    fn thought_chain_changed(&mut self, index: usize, message: &ChatMessage) {
        let mut lines = Vec::new();
        for item in message.thought_chain.iter() {
            let key = (index, item.key.clone());
            let previous = self.thoughts.insert(key, item.status);
            let title = if item.title.is_empty() {
                &item.key
            } else {
                &item.title
            };
            match (previous, item.status) {
                (None, ThoughtStatus::Pending) => lines.push(format!("  · {}\n", title)),
                (None | Some(ThoughtStatus::Pending), ThoughtStatus::Done) => {
                    lines.push(format!("  ✓ {}\n", title));
                }
                _ => {}
            }
        }
        for line in lines {
            self.write(&line);
        }
    }

    fn turn_finished(&mut self, index: usize, _message: &ChatMessage) {
        if self.printed.remove(&index).is_some() {
            self.write("\n");
        }
    }
}
