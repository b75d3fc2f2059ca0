//! Adaptive scroll-and-capture loop for reading long chat transcripts.
//!
//! A [`ScrollLoop`] repeatedly screenshots a chat window, extracts its
//! messages, checks stop conditions and scrolls by a randomized, human-like
//! amount. The platform pieces (window control, OCR, pointer) are supplied
//! through the traits in [`bridge`].

pub mod bridge;
pub mod capture;
pub mod config;
pub mod models;
pub mod motion;
pub mod pacing;
pub mod scroll;
pub mod stop;
pub mod utils;
pub mod watchdog;

pub use bridge::{BaseController, MessageExtractor, PointerProbe};
pub use config::ScrollConfig;
pub use models::{
    CaptureState, ChatMessage, Position, Rect, ScrollDirection, ScrollSession, ScrollStatistics,
    SessionStatus, TerminationReason, TextRegion, WindowSnapshot,
};
pub use scroll::{ScrollController, ScrollLoop, ScrollOutcome, ScrollRequest};
pub use stop::{StopConditionEvaluator, StopDecision, StopReason};
pub use utils::init_logging;
