use std::collections::VecDeque;

use rand::Rng;

use crate::models::ScrollDirection;

/// Every n-th iteration scrolls further than usual.
pub const BIG_STEP_EVERY: u64 = 5;
pub const BIG_STEP_FACTOR: f64 = 1.5;
/// Number of distances averaged by the inertial adjustment, current one included.
pub const INERTIA_WINDOW: usize = 3;
/// Prior distances required before inertia kicks in.
pub const INERTIA_MIN_HISTORY: usize = 2;
pub const INERTIA_FACTOR_RANGE: (f64, f64) = (0.8, 1.2);

/// Distances chosen for a single scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollStep {
    /// Uniform draw from the configured range.
    pub base: f64,
    /// `base` after the periodic big-step rule.
    pub stepped: f64,
    /// Final distance after the optional inertial adjustment.
    pub distance: f64,
}

impl ScrollStep {
    /// Wheel units handed to the scroll primitive. Up is positive, down negative.
    pub fn realized_amount(&self, speed: u32, direction: ScrollDirection) -> i32 {
        realized_amount(self.distance, speed, direction)
    }
}

pub fn realized_amount(distance: f64, speed: u32, direction: ScrollDirection) -> i32 {
    let magnitude = (distance * f64::from(speed) / 2.0).round() as i32;
    match direction {
        ScrollDirection::Up => magnitude,
        ScrollDirection::Down => -magnitude,
    }
}

pub fn apply_big_step(base: f64, iteration: u64) -> f64 {
    if iteration % BIG_STEP_EVERY == 0 {
        base * BIG_STEP_FACTOR
    } else {
        base
    }
}

/// Chooses how far each iteration scrolls.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    min: u32,
    max: u32,
    inertial: bool,
    recent: VecDeque<f64>,
}

impl DistanceModel {
    pub fn new(range: (u32, u32), inertial: bool) -> Self {
        let (min, max) = if range.0 <= range.1 {
            range
        } else {
            (range.1, range.0)
        };
        Self {
            min,
            max,
            inertial,
            recent: VecDeque::with_capacity(INERTIA_WINDOW),
        }
    }

    pub fn base_draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        f64::from(rng.gen_range(self.min..=self.max))
    }

    /// Produce the step for `iteration` and remember it for later inertia.
    pub fn next_step<R: Rng + ?Sized>(&mut self, iteration: u64, rng: &mut R) -> ScrollStep {
        let base = self.base_draw(rng);
        let stepped = apply_big_step(base, iteration);
        let distance = if self.inertial {
            self.apply_inertia(stepped, rng)
        } else {
            stepped
        };

        if self.recent.len() == INERTIA_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(stepped);

        ScrollStep {
            base,
            stepped,
            distance,
        }
    }

    /// Blend `stepped` with recent distances and jitter it, clamped to
    /// `[min, 2 * max]`. Returns `stepped` unchanged until enough history exists.
    pub fn apply_inertia<R: Rng + ?Sized>(&self, stepped: f64, rng: &mut R) -> f64 {
        if self.recent.len() < INERTIA_MIN_HISTORY {
            return stepped;
        }

        let prior = self.recent.iter().rev().take(INERTIA_WINDOW - 1);
        let (sum, count) = prior.fold((stepped, 1usize), |(sum, count), d| (sum + d, count + 1));
        let average = sum / count as f64;

        let factor = rng.gen_range(INERTIA_FACTOR_RANGE.0..=INERTIA_FACTOR_RANGE.1);
        let adjusted = (average * factor).trunc();

        adjusted.clamp(f64::from(self.min), f64::from(self.max) * 2.0)
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}
