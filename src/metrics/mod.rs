mod geometry;
mod report;
mod rle;

pub use geometry::{BoundingBox, average_precision};
pub use report::{AggregateMetrics, ClassMetrics, ClassificationReport};
pub use rle::{Mask, mask_iou, rle_decode, rle_encode};
