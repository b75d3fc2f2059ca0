use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_ENABLE_WATCHDOG: &str = "CHATSCROLL_ENABLE_WATCHDOG";
pub const ENV_WATCHDOG_INTERVAL_MS: &str = "CHATSCROLL_WATCHDOG_INTERVAL_MS";

/// Tunables for one scroll loop. Every field has a default, so a partial
/// JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Wheel speed multiplier, 1 to 10.
    pub scroll_speed: u32,
    pub scroll_delay_ms: u64,
    /// Per-iteration scroll distance, drawn uniformly.
    pub scroll_distance_range: (u32, u32),
    /// Pause between iterations, drawn uniformly.
    pub scroll_interval_range_ms: (u64, u64),
    pub inertial_effect: bool,
    pub enable_watchdog: bool,
    pub watchdog_interval_ms: u64,
    pub max_image_width: u32,
    /// How many of the newest history entries keep their image.
    pub history_keep_images: usize,
    pub similarity_threshold: f64,
    pub human_pause_probability: f64,
    pub human_pause_range_ms: (u64, u64),
    pub max_scrolls_per_minute: Option<u32>,
    pub spm_range: Option<(u32, u32)>,
    pub spm_jitter: f64,
    pub readiness_retries: u32,
    pub readiness_delay_ms: u64,
    pub recovery_retries: u32,
    pub recovery_delay_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            scroll_speed: 2,
            scroll_delay_ms: 1000,
            scroll_distance_range: (200, 300),
            scroll_interval_range_ms: (300, 500),
            inertial_effect: true,
            enable_watchdog: false,
            watchdog_interval_ms: 5000,
            max_image_width: 1400,
            history_keep_images: 3,
            similarity_threshold: 0.98,
            human_pause_probability: 0.12,
            human_pause_range_ms: (1200, 2600),
            max_scrolls_per_minute: None,
            spm_range: None,
            spm_jitter: 0.3,
            readiness_retries: 1,
            readiness_delay_ms: 200,
            recovery_retries: 2,
            recovery_delay_ms: 300,
        }
    }
}

impl ScrollConfig {
    /// Read a JSON config. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scroll config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse scroll config {}", path.display()))?;
        Ok(config)
    }

    /// Apply `CHATSCROLL_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_ENABLE_WATCHDOG) {
            self.enable_watchdog = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(interval) = lookup(ENV_WATCHDOG_INTERVAL_MS).and_then(|v| v.trim().parse().ok()) {
            self.watchdog_interval_ms = interval;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let (min, max) = self.scroll_distance_range;
        if min == 0 || min > max {
            bail!("invalid scroll_distance_range ({min}, {max})");
        }
        let (min, max) = self.scroll_interval_range_ms;
        if min > max {
            bail!("invalid scroll_interval_range_ms ({min}, {max})");
        }
        let (min, max) = self.human_pause_range_ms;
        if min > max {
            bail!("invalid human_pause_range_ms ({min}, {max})");
        }
        if !(0.0..=1.0).contains(&self.human_pause_probability) {
            bail!("human_pause_probability must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!("similarity_threshold must be within [0, 1]");
        }
        if !(0.0..1.0).contains(&self.spm_jitter) {
            bail!("spm_jitter must be within [0, 1)");
        }
        if self.max_image_width == 0 {
            bail!("max_image_width must be positive");
        }
        if self.watchdog_interval_ms == 0 {
            bail!("watchdog_interval_ms must be positive");
        }
        if let Some((min, max)) = self.spm_range {
            if min == 0 || min > max {
                bail!("invalid spm_range ({min}, {max})");
            }
        }
        if self.max_scrolls_per_minute == Some(0) {
            bail!("max_scrolls_per_minute must be positive when set");
        }
        Ok(())
    }

    pub fn clamped_speed(&self) -> u32 {
        self.scroll_speed.clamp(1, 10)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn readiness_delay(&self) -> Duration {
        Duration::from_millis(self.readiness_delay_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}
