pub mod distance;
pub mod position;

pub use distance::{apply_big_step, realized_amount, DistanceModel, ScrollStep};
pub use position::{clamp_to_area, PositionModel, EDGE_MARGIN};
