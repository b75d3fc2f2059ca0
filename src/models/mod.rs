pub mod capture;
pub mod geometry;
pub mod session;

pub use capture::{summarize_messages, CaptureState, ChatMessage, TextRegion, WindowSnapshot};
pub use geometry::{Position, Rect, ScrollDirection};
pub use session::{ScrollSession, ScrollStatistics, SessionStatus, TerminationReason};
