#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chatscroll::{
    BaseController, ChatMessage, MessageExtractor, PointerProbe, Position, Rect, ScrollConfig,
    TextRegion, WindowSnapshot,
};
use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CHAT_AREA: Rect = Rect {
    x: 0,
    y: 0,
    width: 800,
    height: 600,
};

/// Config with near-zero pacing so loop tests finish quickly.
pub fn fast_config() -> ScrollConfig {
    ScrollConfig {
        scroll_interval_range_ms: (0, 1),
        human_pause_probability: 0.0,
        readiness_delay_ms: 0,
        recovery_delay_ms: 0,
        ..ScrollConfig::default()
    }
}

/// Random RGB noise; different seeds give structurally unrelated frames.
pub fn noise_frame(seed: u64) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let img = RgbImage::from_fn(96, 96, |_, _| {
        image::Rgb([rng.gen(), rng.gen(), rng.gen()])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn distinct_frames(count: u64) -> Vec<DynamicImage> {
    (0..count).map(|seed| noise_frame(seed + 1)).collect()
}

/// Controller double that replays frames and records every scroll.
pub struct ScriptedController {
    frames: Vec<DynamicImage>,
    captures: AtomicUsize,
    bounds: Option<Rect>,
    pub at_top: AtomicBool,
    pub at_bottom: AtomicBool,
    scroll_failures: AtomicUsize,
    pub scrolls: Mutex<Vec<(Position, i32)>>,
}

impl ScriptedController {
    pub fn new(frames: Vec<DynamicImage>) -> Self {
        Self {
            frames,
            captures: AtomicUsize::new(0),
            bounds: Some(CHAT_AREA),
            at_top: AtomicBool::new(false),
            at_bottom: AtomicBool::new(false),
            scroll_failures: AtomicUsize::new(0),
            scrolls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_bounds(mut self) -> Self {
        self.bounds = None;
        self
    }

    /// Make the next `count` scroll attempts fail.
    pub fn failing_scrolls(self, count: usize) -> Self {
        self.scroll_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn at_top(self) -> Self {
        self.at_top.store(true, Ordering::SeqCst);
        self
    }

    pub fn scroll_calls(&self) -> Vec<(Position, i32)> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn capture_calls(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl BaseController for ScriptedController {
    fn ensure_window_ready(&self, _retries: u32, _delay: Duration) -> bool {
        true
    }

    fn is_window_valid(&self) -> bool {
        true
    }

    fn get_chat_area_bounds(&self) -> Option<Rect> {
        self.bounds
    }

    fn window_snapshot(&self) -> Option<WindowSnapshot> {
        Some(WindowSnapshot {
            title: "Chat".to_string(),
            bounds: CHAT_AREA,
        })
    }

    fn is_at_top(&self) -> bool {
        self.at_top.load(Ordering::SeqCst)
    }

    fn is_at_bottom(&self) -> bool {
        self.at_bottom.load(Ordering::SeqCst)
    }

    fn capture_current_view(&self) -> Option<DynamicImage> {
        let index = self.captures.fetch_add(1, Ordering::SeqCst);
        let last = self.frames.len().checked_sub(1)?;
        self.frames.get(index.min(last)).cloned()
    }

    fn scroll_at(&self, position: Position, amount: i32) -> Result<()> {
        let remaining = self.scroll_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.scroll_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("scroll event rejected"));
        }
        self.scrolls.lock().unwrap().push((position, amount));
        Ok(())
    }
}

/// Extractor double returning the same messages for every frame.
pub struct FixedExtractor {
    messages: Vec<ChatMessage>,
}

impl FixedExtractor {
    pub fn new(contents: &[&str]) -> Self {
        Self {
            messages: contents
                .iter()
                .map(|content| ChatMessage {
                    sender: None,
                    content: content.to_string(),
                })
                .collect(),
        }
    }
}

impl MessageExtractor for FixedExtractor {
    fn extract_text_regions(&self, _image: &DynamicImage) -> Result<Vec<TextRegion>> {
        Ok(Vec::new())
    }

    fn parse(&self, _regions: &[TextRegion]) -> Result<Vec<ChatMessage>> {
        Ok(self.messages.clone())
    }
}

pub struct FailingExtractor;

impl MessageExtractor for FailingExtractor {
    fn extract_text_regions(&self, _image: &DynamicImage) -> Result<Vec<TextRegion>> {
        Err(anyhow!("ocr engine unavailable"))
    }

    fn parse(&self, _regions: &[TextRegion]) -> Result<Vec<ChatMessage>> {
        Ok(Vec::new())
    }
}

/// Pointer double parked at a fixed spot on a 1920x1080 screen.
pub struct FixedPointer(pub Position);

impl PointerProbe for FixedPointer {
    fn current_pointer_position(&self) -> Result<Position> {
        Ok(self.0)
    }

    fn screen_size(&self) -> Result<(i32, i32)> {
        Ok((1920, 1080))
    }
}

pub fn shared(controller: ScriptedController) -> Arc<ScriptedController> {
    Arc::new(controller)
}
