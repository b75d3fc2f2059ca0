use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::ScrollConfig;

pub const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Extra pause inserted when the per-minute sub-limit is reached.
pub const SUB_LIMIT_PAUSE_MS: (u64, u64) = (800, 2200);

/// Randomized pacing between iterations.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval_ms: (u64, u64),
    pause_probability: f64,
    pause_ms: (u64, u64),
}

/// Sleep chosen for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingDelay {
    pub base: Duration,
    pub human_pause: Option<Duration>,
}

impl PacingDelay {
    pub fn total(&self) -> Duration {
        self.base + self.human_pause.unwrap_or_default()
    }
}

impl Pacer {
    pub fn new(interval_ms: (u64, u64), pause_probability: f64, pause_ms: (u64, u64)) -> Self {
        Self {
            interval_ms,
            pause_probability: pause_probability.clamp(0.0, 1.0),
            pause_ms,
        }
    }

    pub fn from_config(config: &ScrollConfig) -> Self {
        Self::new(
            config.scroll_interval_range_ms,
            config.human_pause_probability,
            config.human_pause_range_ms,
        )
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> PacingDelay {
        let base = Duration::from_millis(draw_ms(self.interval_ms, rng));
        let human_pause = (self.pause_probability > 0.0 && rng.gen_bool(self.pause_probability))
            .then(|| Duration::from_millis(draw_ms(self.pause_ms, rng)));
        PacingDelay { base, human_pause }
    }
}

fn draw_ms<R: Rng + ?Sized>((min, max): (u64, u64), rng: &mut R) -> u64 {
    if min >= max {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

/// Scrolls-per-minute limiter over fixed 60 second windows.
///
/// Each window carries a hard cap and a randomly drawn softer sub-limit.
/// Reaching the cap waits out the window; reaching the sub-limit inserts a
/// short pause and relaxes the count. Delays are returned, not slept, so the
/// caller decides how to wait.
#[derive(Debug, Clone)]
pub struct RateWindow {
    max_per_minute: u32,
    range: Option<(u32, u32)>,
    jitter: f64,
    window_start: Instant,
    count: u32,
    current_limit: Option<u32>,
}

impl RateWindow {
    pub fn from_config<R: Rng + ?Sized>(config: &ScrollConfig, now: Instant, rng: &mut R) -> Option<Self> {
        let max_per_minute = config
            .max_scrolls_per_minute
            .or_else(|| config.spm_range.map(|(_, max)| max))?;
        Some(Self::new(max_per_minute, config.spm_range, config.spm_jitter, now, rng))
    }

    pub fn new<R: Rng + ?Sized>(
        max_per_minute: u32,
        range: Option<(u32, u32)>,
        jitter: f64,
        now: Instant,
        rng: &mut R,
    ) -> Self {
        let mut window = Self {
            max_per_minute: max_per_minute.max(1),
            range,
            jitter: jitter.clamp(0.0, 0.9),
            window_start: now,
            count: 0,
            current_limit: None,
        };
        window.current_limit = window.draw_sub_limit(rng);
        window
    }

    fn draw_sub_limit<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u32> {
        match self.range {
            Some((low, high)) => Some(rng.gen_range(low..=high.max(low))),
            None => {
                let base = f64::from(self.max_per_minute);
                let low = ((base * (1.0 - self.jitter).max(0.1)).round() as u32).max(1);
                Some(rng.gen_range(low..=self.max_per_minute.max(low)))
            }
        }
    }

    /// Count one scroll attempt at `now` and return how long to wait first.
    pub fn acquire<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Duration {
        let mut wait = Duration::ZERO;

        if now.duration_since(self.window_start) >= RATE_WINDOW {
            self.roll_window(now, rng);
        }

        if self.count >= self.max_per_minute {
            wait += RATE_WINDOW.saturating_sub(now.duration_since(self.window_start));
            self.roll_window(now + wait, rng);
        }

        if let Some(limit) = self.current_limit {
            if self.count >= limit {
                wait += Duration::from_millis(draw_ms(SUB_LIMIT_PAUSE_MS, rng));
                self.count = self.count.saturating_sub(limit / 2);
            }
        }

        self.count += 1;
        wait
    }

    fn roll_window<R: Rng + ?Sized>(&mut self, start: Instant, rng: &mut R) {
        self.window_start = start;
        self.count = 0;
        self.current_limit = self.draw_sub_limit(rng);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current_limit(&self) -> Option<u32> {
        self.current_limit
    }
}
