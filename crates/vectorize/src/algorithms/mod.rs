pub mod contours;
pub mod holes;
pub mod percentile;

pub use contours::ImageprocContourTracer;
pub use holes::ContainmentHoleDetector;
pub use percentile::{percentile, surviving_labels};
