use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bridge::{BaseController, PointerProbe};
use crate::models::{CaptureState, Position, ScrollDirection};

/// How close to a screen corner the pointer must be to count as an abort.
pub const CORNER_MARGIN: i32 = 10;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    TargetContentMatched,
    EdgeReached,
    UserInterrupt,
    None,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TargetContentMatched => "target_content_matched",
            StopReason::EdgeReached => "edge_reached",
            StopReason::UserInterrupt => "user_interrupt",
            StopReason::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopDecision {
    pub stop: bool,
    pub reason: StopReason,
}

impl StopDecision {
    pub fn proceed() -> Self {
        Self {
            stop: false,
            reason: StopReason::None,
        }
    }

    pub fn stop(reason: StopReason) -> Self {
        Self { stop: true, reason }
    }
}

/// Checks, in order, for the target text, the transcript edge in the scroll
/// direction and the operator's corner gesture. The first hit wins.
#[derive(Clone)]
pub struct StopConditionEvaluator {
    controller: Arc<dyn BaseController>,
    pointer: Option<Arc<dyn PointerProbe>>,
    corner_margin: i32,
}

impl StopConditionEvaluator {
    pub fn new(controller: Arc<dyn BaseController>, pointer: Option<Arc<dyn PointerProbe>>) -> Self {
        Self {
            controller,
            pointer,
            corner_margin: CORNER_MARGIN,
        }
    }

    /// Runs collaborator probes; call from a blocking context.
    pub fn evaluate(
        &self,
        state: &CaptureState,
        target_content: Option<&str>,
        stop_at_edges: bool,
        direction: ScrollDirection,
    ) -> StopDecision {
        self.evaluate_summary(&state.content_summary, target_content, stop_at_edges, direction)
    }

    /// Same as [`evaluate`](Self::evaluate), given only the state's summary.
    pub fn evaluate_summary(
        &self,
        content_summary: &str,
        target_content: Option<&str>,
        stop_at_edges: bool,
        direction: ScrollDirection,
    ) -> StopDecision {
        if let Some(target) = target_content {
            if contains_target(content_summary, target) {
                log_info!("target content '{}' found on screen", target);
                return StopDecision::stop(StopReason::TargetContentMatched);
            }
        }

        if stop_at_edges && self.at_edge(direction) {
            log_info!("reached the {} edge of the transcript", direction);
            return StopDecision::stop(StopReason::EdgeReached);
        }

        if self.user_interrupted() {
            log_info!("pointer parked in a screen corner; treating as user interrupt");
            return StopDecision::stop(StopReason::UserInterrupt);
        }

        StopDecision::proceed()
    }

    fn at_edge(&self, direction: ScrollDirection) -> bool {
        match direction {
            ScrollDirection::Up => self.controller.is_at_top(),
            ScrollDirection::Down => self.controller.is_at_bottom(),
        }
    }

    fn user_interrupted(&self) -> bool {
        let Some(pointer) = &self.pointer else {
            return false;
        };

        let position = match pointer.current_pointer_position() {
            Ok(position) => position,
            Err(err) => {
                log_debug!("pointer position unavailable: {err:#}");
                return false;
            }
        };
        let screen = match pointer.screen_size() {
            Ok(size) => size,
            Err(err) => {
                log_debug!("screen size unavailable: {err:#}");
                return false;
            }
        };

        in_screen_corner(position, screen, self.corner_margin)
    }
}

/// Case-insensitive substring test. An empty target never matches.
pub fn contains_target(summary: &str, target: &str) -> bool {
    if target.is_empty() || summary.is_empty() {
        return false;
    }
    summary.to_lowercase().contains(&target.to_lowercase())
}

pub fn in_screen_corner(position: Position, (width, height): (i32, i32), margin: i32) -> bool {
    let near_left = position.x <= margin;
    let near_right = position.x >= width - margin;
    let near_top = position.y <= margin;
    let near_bottom = position.y >= height - margin;

    (near_left || near_right) && (near_top || near_bottom)
}
