use std::time::Duration;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::geometry::{Position, Rect};

/// Number of parsed messages folded into a state's content summary.
pub const SUMMARY_MESSAGE_LIMIT: usize = 5;

/// Opaque description of the target window as reported by the base controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub title: String,
    pub bounds: Rect,
}

/// A block of recognised text with its location in the captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub confidence: f32,
    pub bounds: Rect,
}

/// A chat message as produced by the downstream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Option<String>,
    pub content: String,
}

/// Everything recorded for one loop iteration.
///
/// `image` starts out present (when the capture succeeded) and is released by
/// history pruning; nothing ever puts it back.
#[derive(Debug, Clone)]
pub struct CaptureState {
    pub iteration: u64,
    pub captured_at: DateTime<Utc>,
    pub position: Position,
    pub image: Option<DynamicImage>,
    pub messages: Vec<ChatMessage>,
    pub message_count: usize,
    pub content_summary: String,
    pub window: Option<WindowSnapshot>,
    pub scroll_speed: u32,
    pub scroll_delay: Duration,
}

impl CaptureState {
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Attach parsed messages, refreshing the derived count and summary.
    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        self.message_count = messages.len();
        self.content_summary = summarize_messages(&messages);
        self.messages = messages;
    }

    /// Drop any message data, used when extraction failed for this iteration.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.message_count = 0;
        self.content_summary.clear();
    }
}

/// Join the contents of the first few messages with single spaces.
pub fn summarize_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .take(SUMMARY_MESSAGE_LIMIT)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
