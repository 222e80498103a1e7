//! Presentation hooks
//!
//! The session reports visible changes to a [`RenderSink`]; the view layer
//! decides how to draw them. [`ScrollFollow`] tracks whether the viewer is
//! still pinned to the bottom of the transcript.

use crate::message::ChatMessage;

/// Distance from the bottom (in pixels) still counted as "at bottom"
pub const BOTTOM_TOLERANCE: f64 = 5.0;

/// Receives visible transcript changes
pub trait RenderSink: Send {
    /// A message was appended or its content changed
    fn message_changed(&mut self, index: usize, message: &ChatMessage);

    /// The thought chain of a message changed
    fn thought_chain_changed(&mut self, index: usize, message: &ChatMessage) {
        self.message_changed(index, message);
    }

    /// A turn finished (successfully or not)
    fn turn_finished(&mut self, _index: usize, _message: &ChatMessage) {}

    /// Keep the newest output in view
    fn scroll_to_bottom(&mut self) {}
}

/// Sink that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRender;

impl RenderSink for NullRender {
    fn message_changed(&mut self, _index: usize, _message: &ChatMessage) {}
}

/// Auto-scroll state of the transcript viewport
#[derive(Debug, Clone, Copy)]
pub struct ScrollFollow {
    enabled: bool,
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ScrollFollow {
    /// Whether new output should scroll into view
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.enabled
    }

    /// Record a viewport scroll position
    pub fn on_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) {
        self.enabled = scroll_height - scroll_top <= client_height + BOTTOM_TOLERANCE;
    }

    /// Viewer scrolled away from the bottom
    pub fn detach(&mut self) {
        self.enabled = false;
    }

    /// Viewer returned to the bottom
    pub fn attach(&mut self) {
        self.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_follow_tolerance() {
        let mut follow = ScrollFollow::default();
        assert!(follow.is_following());

        follow.on_scroll(100.0, 800.0, 600.0);
        assert!(!follow.is_following());

        follow.on_scroll(196.0, 800.0, 600.0);
        assert!(follow.is_following());
    }
}
