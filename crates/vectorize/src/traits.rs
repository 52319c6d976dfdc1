use image::GrayImage;

use crate::{error::Result, types::SegmentShape};

/// Trait for contour tracing algorithms over a binary label mask
pub trait ContourTracer: Send + Sync {
    /// Trace closed rings (pixel coordinates) around the foreground
    fn trace(&self, mask: &GrayImage) -> Result<Vec<Vec<[f64; 2]>>>;
}

/// Trait for grouping traced rings into shapes with holes
pub trait HoleDetector: Send + Sync {
    fn detect(&self, rings: Vec<Vec<[f64; 2]>>) -> Result<Vec<SegmentShape>>;
}
