//! Background liveness reporting for the scroll loop.
//!
//! The loop publishes its iteration count through a `watch` channel; a
//! separate task turns those beats, plus a periodic tick, into heartbeat log
//! lines with process resource usage. The task only ever reads the channel.
//! Without a running task each beat is sampled and logged in place.

mod resources;

pub use resources::{ResourceSampler, ResourceUsage, WatchdogHeartbeat};

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ScrollConfig;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Ticks without a new iteration before the watchdog reports a stall.
pub const STALL_INTERVALS: u32 = 3;

pub struct Watchdog {
    enabled: bool,
    interval: Duration,
    beat_tx: watch::Sender<u64>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    sampler: ResourceSampler,
    run_started: Instant,
}

impl Watchdog {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        let (beat_tx, _) = watch::channel(0);
        Self {
            enabled,
            interval: interval.max(Duration::from_millis(100)),
            beat_tx,
            handle: None,
            cancel_token: None,
            sampler: ResourceSampler::new(),
            run_started: Instant::now(),
        }
    }

    pub fn from_config(config: &ScrollConfig) -> Self {
        Self::new(config.enable_watchdog, config.watchdog_interval())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the reporter task. Returns whether a task is running afterwards;
    /// calling it again while running is a no-op.
    pub fn start(&mut self) -> bool {
        if self.handle.is_none() {
            self.run_started = Instant::now();
        }
        if !self.enabled {
            return false;
        }
        if self.handle.is_some() {
            return true;
        }

        self.beat_tx.send_replace(0);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(watchdog_loop(
            self.beat_tx.subscribe(),
            self.interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("watchdog started (interval {:?})", self.interval);
        true
    }

    /// Publish the loop's current iteration. When no reporter task is
    /// running the heartbeat is logged here at debug level.
    pub fn beat(&mut self, iteration: u64) -> Option<WatchdogHeartbeat> {
        self.beat_tx.send_replace(iteration);
        if self.handle.is_some() {
            return None;
        }

        let heartbeat = WatchdogHeartbeat {
            iteration,
            elapsed: self.run_started.elapsed(),
            usage: self.sampler.sample(),
        };
        log_debug!("{heartbeat}");
        Some(heartbeat)
    }

    /// Stop and join the reporter task. Safe to call when it never started.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => log_info!("watchdog stopped"),
                Err(err) => log_warn!("watchdog task failed to join: {err}"),
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

async fn watchdog_loop(
    mut beats: watch::Receiver<u64>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let started = Instant::now();
    let mut sampler = ResourceSampler::new();
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_progress = Instant::now();
    let stall_after = interval * STALL_INTERVALS;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            changed = beats.changed() => {
                if changed.is_err() {
                    break;
                }
                let iteration = *beats.borrow_and_update();
                last_progress = Instant::now();
                let heartbeat = WatchdogHeartbeat {
                    iteration,
                    elapsed: started.elapsed(),
                    usage: sampler.sample(),
                };
                log_debug!("{heartbeat}");
            }
            _ = ticker.tick() => {
                let iteration = *beats.borrow();
                let heartbeat = WatchdogHeartbeat {
                    iteration,
                    elapsed: started.elapsed(),
                    usage: sampler.sample(),
                };
                log_info!("watchdog {heartbeat}");

                let idle = last_progress.elapsed();
                if idle >= stall_after {
                    log_warn!(
                        "watchdog: no loop progress for {:.1}s (still at iteration {})",
                        idle.as_secs_f64(),
                        iteration
                    );
                }
            }
        }
    }
}
