use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::bridge::{BaseController, MessageExtractor, PointerProbe};
use crate::capture::{maybe_downscale, ContentChangeDetector, HistoryBuffer};
use crate::config::ScrollConfig;
use crate::models::{
    CaptureState, ChatMessage, Rect, ScrollDirection, ScrollSession, ScrollStatistics,
    TerminationReason, WindowSnapshot,
};
use crate::motion::{DistanceModel, PositionModel};
use crate::pacing::{Pacer, RateWindow};
use crate::stop::{StopConditionEvaluator, StopDecision};
use crate::watchdog::Watchdog;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

/// Identical captures in a row that end the run as stalled.
pub const CONTENT_STALL_ITERATIONS: u32 = 3;

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest {
    pub direction: ScrollDirection,
    pub max_iterations: u32,
    pub target_content: Option<String>,
    pub stop_at_edges: bool,
    pub max_duration: Option<Duration>,
}

impl ScrollRequest {
    pub fn new(direction: ScrollDirection, max_iterations: u32) -> Self {
        Self {
            direction,
            max_iterations,
            target_content: None,
            stop_at_edges: true,
            max_duration: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_content = Some(target.into());
        self
    }

    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn with_stop_at_edges(mut self, stop_at_edges: bool) -> Self {
        self.stop_at_edges = stop_at_edges;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("max_iterations must be greater than zero");
        }
        Ok(())
    }

    fn target(&self) -> Option<&str> {
        self.target_content.as_deref().filter(|target| !target.is_empty())
    }
}

/// Result of running message extraction on one capture.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Extracted(Vec<ChatMessage>),
    /// Extraction ran and failed; the iteration carries no messages.
    Degraded(anyhow::Error),
    /// No image or no extractor configured.
    Skipped,
}

struct CapturedView {
    image: Option<DynamicImage>,
    window: Option<WindowSnapshot>,
    extraction: ExtractionOutcome,
}

/// Drives the capture, evaluate, scroll and pace cycle against a chat window.
pub struct ScrollLoop {
    config: ScrollConfig,
    controller: Arc<dyn BaseController>,
    extractor: Option<Arc<dyn MessageExtractor>>,
    pointer: Option<Arc<dyn PointerProbe>>,
    distance: DistanceModel,
    position: PositionModel,
    pacer: Pacer,
    rate: Option<RateWindow>,
    detector: ContentChangeDetector,
    history: HistoryBuffer,
    session: Option<ScrollSession>,
    watchdog: Watchdog,
    cancel_token: CancellationToken,
    rng: StdRng,
}

impl ScrollLoop {
    pub fn new(config: ScrollConfig, controller: Arc<dyn BaseController>) -> Result<Self> {
        config.validate().context("invalid scroll configuration")?;

        Ok(Self {
            distance: DistanceModel::new(config.scroll_distance_range, config.inertial_effect),
            position: PositionModel::new(),
            pacer: Pacer::from_config(&config),
            rate: None,
            detector: ContentChangeDetector::new(config.similarity_threshold),
            history: HistoryBuffer::new(),
            session: None,
            watchdog: Watchdog::from_config(&config),
            cancel_token: CancellationToken::new(),
            rng: StdRng::from_entropy(),
            extractor: None,
            pointer: None,
            controller,
            config,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MessageExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_pointer_probe(mut self, pointer: Arc<dyn PointerProbe>) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Token that stops the loop at its next check. It stays cancelled until
    /// [`reset`](Self::reset).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn session(&self) -> Option<&ScrollSession> {
        self.session.as_ref()
    }

    pub fn statistics(&self) -> Option<ScrollStatistics> {
        self.session.as_ref().map(ScrollSession::statistics)
    }

    /// Forget the last session and re-arm cancellation.
    pub fn reset(&mut self) {
        self.session = None;
        self.history.clear();
        self.distance.reset();
        self.position.reset();
        self.rate = None;
        if self.cancel_token.is_cancelled() {
            self.cancel_token = CancellationToken::new();
        }
    }

    /// Scroll until a stop condition, a limit or a failure ends the run, and
    /// return every captured state in iteration order.
    ///
    /// Only an invalid request is reported as an error. Everything that goes
    /// wrong while scrolling ends the run early and is recorded on the session.
    pub async fn run(&mut self, request: ScrollRequest) -> Result<Vec<CaptureState>> {
        request.validate()?;

        self.history.clear();
        self.distance.reset();
        self.position.reset();
        self.rate = RateWindow::from_config(&self.config, std::time::Instant::now(), &mut self.rng);

        let started = Instant::now();
        let mut session = ScrollSession::begin(request.direction, Utc::now());
        log_info!(
            "scroll session {} starting: direction={} max_iterations={}",
            session.id,
            request.direction,
            request.max_iterations
        );

        if self.pointer.is_none() {
            log_info!("no pointer probe configured; the corner interrupt gesture is unavailable");
        }

        self.watchdog.start();
        let reason = self.drive(&request, &mut session, started).await;
        self.watchdog.stop().await;

        session.finish(reason, Utc::now());
        let stats = session.statistics();
        match reason {
            TerminationReason::InitialPositionFailed => log_error!(
                "scroll session {} failed before the first iteration",
                session.id
            ),
            TerminationReason::Timeout | TerminationReason::ScrollFailure => log_warn!(
                "scroll session {} ended early ({}) after {} iterations",
                session.id,
                reason.as_str(),
                stats.iterations
            ),
            _ => log_info!(
                "scroll session {} finished ({}): {} iterations, {} messages, {:.1} iterations/min",
                session.id,
                reason.as_str(),
                stats.iterations,
                stats.total_messages,
                stats.iterations_per_minute
            ),
        }

        self.session = Some(session);
        Ok(self.history.take_entries())
    }

    async fn drive(
        &mut self,
        request: &ScrollRequest,
        session: &mut ScrollSession,
        started: Instant,
    ) -> TerminationReason {
        let controller = Arc::clone(&self.controller);
        let initial = run_blocking(move || controller.locate_initial_position())
            .await
            .and_then(|located| located);
        match initial {
            Ok(position) => {
                log_info!("initial scroll position {position}");
                self.position.set(position);
            }
            Err(err) => {
                log_error!("could not locate initial scroll position: {err:#}");
                return TerminationReason::InitialPositionFailed;
            }
        }

        let evaluator = StopConditionEvaluator::new(Arc::clone(&self.controller), self.pointer.clone());

        for iteration in 1..=u64::from(request.max_iterations) {
            self.watchdog.beat(iteration);

            if self.cancel_token.is_cancelled() {
                return TerminationReason::Cancelled;
            }
            if let Some(limit) = request.max_duration {
                if started.elapsed() > limit {
                    log_warn!("reached maximum run time of {:?}; stopping", limit);
                    return TerminationReason::Timeout;
                }
            }

            if !self
                .ensure_window_ready(self.config.readiness_retries, self.config.readiness_delay())
                .await
            {
                if self.cancel_token.is_cancelled() {
                    return TerminationReason::Cancelled;
                }
                log_warn!("window not ready before iteration {iteration}; continuing");
            }

            let state = self.capture_state(iteration).await;

            let decision = self.evaluate(&evaluator, &state, request).await;
            if decision.stop {
                log_info!("stop condition met at iteration {iteration}");
                self.record(state, session).await;
                return TerminationReason::StopCondition(decision.reason);
            }

            if !self.wait_for_rate_limit().await {
                self.record(state, session).await;
                return TerminationReason::Cancelled;
            }

            if !self.scroll_with_recovery(request.direction, iteration).await {
                self.record(state, session).await;
                if self.cancel_token.is_cancelled() {
                    return TerminationReason::Cancelled;
                }
                return TerminationReason::ScrollFailure;
            }

            let paced = self.pace().await;
            self.record(state, session).await;
            if !paced {
                return TerminationReason::Cancelled;
            }

            if session.consecutive_no_change + 1 >= CONTENT_STALL_ITERATIONS {
                log_info!(
                    "content unchanged for {} iterations; assuming the end was reached",
                    CONTENT_STALL_ITERATIONS
                );
                return TerminationReason::ContentStalled;
            }
        }

        TerminationReason::MaxIterations
    }

    async fn ensure_window_ready(&self, retries: u32, delay: Duration) -> bool {
        let controller = Arc::clone(&self.controller);
        let check = run_blocking(move || controller.ensure_window_ready(retries, delay));

        tokio::select! {
            ready = check => match ready {
                Ok(ready) => ready,
                Err(err) => {
                    log_warn!("window readiness check failed: {err:#}");
                    false
                }
            },
            _ = self.cancel_token.cancelled() => false,
        }
    }

    async fn capture_state(&mut self, iteration: u64) -> CaptureState {
        let controller = Arc::clone(&self.controller);
        let extractor = self.extractor.clone();
        let max_width = self.config.max_image_width;

        let captured = run_blocking(move || {
            capture_view(controller.as_ref(), extractor.as_deref(), max_width)
        })
        .await
        .unwrap_or_else(|err| {
            log_warn!("capture worker failed at iteration {iteration}: {err:#}");
            CapturedView {
                image: None,
                window: None,
                extraction: ExtractionOutcome::Skipped,
            }
        });

        if captured.image.is_none() {
            log_warn!("no screenshot captured at iteration {iteration}");
        }

        let mut state = CaptureState {
            iteration,
            captured_at: Utc::now(),
            position: self.position.current().unwrap_or_default(),
            image: captured.image,
            messages: Vec::new(),
            message_count: 0,
            content_summary: String::new(),
            window: captured.window,
            scroll_speed: self.config.clamped_speed(),
            scroll_delay: self.config.scroll_delay(),
        };

        match captured.extraction {
            ExtractionOutcome::Extracted(messages) => {
                log_debug!("iteration {iteration}: {} messages", messages.len());
                state.set_messages(messages);
            }
            ExtractionOutcome::Degraded(err) => {
                log_warn!("message extraction failed at iteration {iteration}: {err:#}");
                state.clear_messages();
            }
            ExtractionOutcome::Skipped => {}
        }

        state
    }

    async fn evaluate(
        &self,
        evaluator: &StopConditionEvaluator,
        state: &CaptureState,
        request: &ScrollRequest,
    ) -> StopDecision {
        let evaluator = evaluator.clone();
        let summary = state.content_summary.clone();
        let target = request.target().map(str::to_owned);
        let stop_at_edges = request.stop_at_edges;
        let direction = request.direction;

        run_blocking(move || {
            evaluator.evaluate_summary(&summary, target.as_deref(), stop_at_edges, direction)
        })
        .await
        .unwrap_or_else(|err| {
            log_warn!("stop condition check failed: {err:#}");
            StopDecision::proceed()
        })
    }

    /// Wait out the scrolls-per-minute limiter. False when cancelled.
    async fn wait_for_rate_limit(&mut self) -> bool {
        let Some(rate) = self.rate.as_mut() else {
            return true;
        };
        let wait = rate.acquire(std::time::Instant::now(), &mut self.rng);
        if wait.is_zero() {
            return true;
        }
        log_debug!("rate limit reached; waiting {:.2}s", wait.as_secs_f64());
        self.sleep_cancellable(wait).await
    }

    /// One scroll, and on failure one readiness check plus a single retry.
    async fn scroll_with_recovery(&mut self, direction: ScrollDirection, iteration: u64) -> bool {
        let step = self.distance.next_step(iteration, &mut self.rng);
        let amount = step.realized_amount(self.config.clamped_speed(), direction);

        let bounds = match self.scroll_once(amount).await {
            Ok(bounds) => bounds,
            Err(err) => {
                log_warn!("scroll {iteration} failed ({err:#}); re-checking window and retrying once");
                if !self
                    .ensure_window_ready(self.config.recovery_retries, self.config.recovery_delay())
                    .await
                {
                    log_warn!("window still not ready after scroll {iteration} failed");
                    return false;
                }
                match self.scroll_once(amount).await {
                    Ok(bounds) => bounds,
                    Err(err) => {
                        log_warn!("retry of scroll {iteration} failed: {err:#}");
                        return false;
                    }
                }
            }
        };

        log_debug!("scroll {iteration}: {direction} {amount} units (distance {:.0})", step.distance);
        self.position.advance(direction, step.distance as i32, bounds);
        true
    }

    /// Returns the chat area bounds observed right after the scroll.
    async fn scroll_once(&self, amount: i32) -> Result<Option<Rect>> {
        let controller = Arc::clone(&self.controller);
        let position = self.position.current().unwrap_or_default();
        let readiness_delay = self.config.readiness_delay();

        run_blocking(move || {
            controller.throttle_if_needed();
            if !controller.is_window_valid() {
                controller.ensure_window_ready(1, readiness_delay);
            }
            controller
                .scroll_at(position, amount)
                .with_context(|| format!("scroll of {amount} at {position} failed"))?;
            Ok(controller.get_chat_area_bounds())
        })
        .await
        .and_then(|scrolled| scrolled)
    }

    /// Randomized pause between iterations. False when cancelled.
    async fn pace(&mut self) -> bool {
        let delay = self.pacer.next_delay(&mut self.rng);
        if let Some(pause) = delay.human_pause {
            log_debug!("taking an extra {:.2}s pause", pause.as_secs_f64());
        }
        self.sleep_cancellable(delay.total()).await
    }

    async fn sleep_cancellable(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel_token.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel_token.cancelled() => false,
        }
    }

    /// Append `state`, update the stall counter and release old images.
    async fn record(&mut self, state: CaptureState, session: &mut ScrollSession) {
        let unchanged = self.compare_with_last(&state).await;
        session.consecutive_no_change = if unchanged {
            session.consecutive_no_change + 1
        } else {
            0
        };

        session.record_iteration(state.message_count);
        let iteration = state.iteration;
        if let Err(err) = self.history.push(state) {
            log_error!("dropping capture for iteration {iteration}: {err:#}");
        }

        let released = self.history.prune_images(self.config.history_keep_images);
        if released > 0 {
            log_debug!("released {released} old screenshots");
        }
    }

    /// Whether `state` shows the same content as the newest recorded capture.
    async fn compare_with_last(&self, state: &CaptureState) -> bool {
        let (Some(previous), Some(current)) = (
            self.history.last().and_then(|previous| previous.image.clone()),
            state.image.clone(),
        ) else {
            return false;
        };

        let detector = self.detector;
        run_blocking(move || detector.is_unchanged(&previous, &current))
            .await
            .unwrap_or_else(|err| {
                log_warn!("capture comparison failed: {err:#}");
                false
            })
    }
}

fn capture_view(
    controller: &dyn BaseController,
    extractor: Option<&dyn MessageExtractor>,
    max_width: u32,
) -> CapturedView {
    let window = controller.window_snapshot();
    let image = maybe_downscale(controller.capture_current_view(), max_width);

    let extraction = match (&image, extractor) {
        (Some(image), Some(extractor)) => match extract_messages(controller, extractor, image) {
            Ok(messages) => ExtractionOutcome::Extracted(messages),
            Err(err) => ExtractionOutcome::Degraded(err),
        },
        _ => ExtractionOutcome::Skipped,
    };

    CapturedView {
        image,
        window,
        extraction,
    }
}

fn extract_messages(
    controller: &dyn BaseController,
    extractor: &dyn MessageExtractor,
    image: &DynamicImage,
) -> Result<Vec<ChatMessage>> {
    let optimized = controller.optimize_screenshot_quality(image);
    let regions = extractor
        .extract_text_regions(&optimized)
        .context("text region extraction failed")?;
    extractor.parse(&regions).context("message parsing failed")
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking worker join failed")
}
