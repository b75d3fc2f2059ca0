pub mod controller;
pub mod loop_worker;

pub use controller::{ScrollController, ScrollOutcome};
pub use loop_worker::{ExtractionOutcome, ScrollLoop, ScrollRequest, CONTENT_STALL_ITERATIONS};
