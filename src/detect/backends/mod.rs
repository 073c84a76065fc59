pub mod column_vote;
pub mod pixel_ratio;

pub use column_vote::ColumnVoteClassifier;
pub use pixel_ratio::{PixelRatioClassifier, OCCUPIED_MOTION_PERCENT};
