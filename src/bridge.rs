//! Interfaces to the desktop surface the loop drives.
//!
//! The loop never talks to a window system directly. Window discovery, the
//! scroll primitive, screenshots and OCR all sit behind these traits so a
//! platform backend (or a test double) can be swapped in.

use std::time::Duration;

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::models::{ChatMessage, Position, Rect, TextRegion, WindowSnapshot};

/// Window geometry, readiness and scroll primitives for the chat application.
///
/// Window state is owned by another process and may change between any two
/// calls, so callers re-query instead of caching results.
pub trait BaseController: Send + Sync {
    /// Pick the point the pointer should scroll from.
    fn locate_initial_position(&self) -> Result<Position> {
        self.get_chat_area_bounds()
            .map(|area| area.center())
            .ok_or_else(|| anyhow!("chat area bounds unavailable"))
    }

    /// Locate and focus the window, retrying up to `retries` times with
    /// `delay` between attempts.
    fn ensure_window_ready(&self, retries: u32, delay: Duration) -> bool;

    fn is_window_valid(&self) -> bool;

    fn get_chat_area_bounds(&self) -> Option<Rect>;

    fn window_snapshot(&self) -> Option<WindowSnapshot> {
        None
    }

    /// True when the transcript cannot scroll further up.
    fn is_at_top(&self) -> bool;

    /// True when the transcript cannot scroll further down.
    fn is_at_bottom(&self) -> bool;

    /// Block if the backend's own rate limit requires it.
    fn throttle_if_needed(&self) {}

    fn capture_current_view(&self) -> Option<DynamicImage>;

    fn optimize_screenshot_quality(&self, image: &DynamicImage) -> DynamicImage {
        image.clone()
    }

    /// Scroll by `amount` wheel units with the pointer at `position`.
    /// Positive amounts scroll up.
    fn scroll_at(&self, position: Position, amount: i32) -> Result<()>;
}

/// OCR and message parsing for a captured chat view.
pub trait MessageExtractor: Send + Sync {
    fn extract_text_regions(&self, image: &DynamicImage) -> Result<Vec<TextRegion>>;

    fn parse(&self, regions: &[TextRegion]) -> Result<Vec<ChatMessage>>;
}

/// Pointer and screen queries used for the corner abort gesture.
pub trait PointerProbe: Send + Sync {
    fn current_pointer_position(&self) -> Result<Position>;

    fn screen_size(&self) -> Result<(i32, i32)>;
}
