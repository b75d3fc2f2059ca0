pub mod downscale;
pub mod history;
pub mod similarity;

pub use downscale::{downscale_to_width, maybe_downscale};
pub use history::{HistoryBuffer, DEFAULT_KEEP_IMAGES};
pub use similarity::{structural_similarity, ContentChangeDetector};
