use image::GrayImage;

use crate::{error::Result, traits::ContourTracer};

/// Imageproc-based contour tracer.
///
/// Rings come back in pixel-center coordinates; rings too short to bound
/// area are dropped here so later stages only see usable geometry.
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourTracer;

impl ContourTracer for ImageprocContourTracer {
    fn trace(&self, mask: &GrayImage) -> Result<Vec<Vec<[f64; 2]>>> {
        let contours = imageproc::contours::find_contours::<i32>(mask);

        let rings = contours
            .into_iter()
            .map(|contour| {
                contour
                    .points
                    .iter()
                    .map(|p| [f64::from(p.x), f64::from(p.y)])
                    .collect::<Vec<_>>()
            })
            .filter(|ring: &Vec<[f64; 2]>| ring.len() >= 3)
            .collect();

        Ok(rings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_traces_a_filled_square() {
        let mut mask = GrayImage::new(32, 32);
        for y in 8..24 {
            for x in 8..24 {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }

        let rings = ImageprocContourTracer.trace(&mask).unwrap();
        assert!(!rings.is_empty());

        // Every traced point sits on the square's boundary region
        for point in &rings[0] {
            assert!(point[0] >= 7.0 && point[0] <= 24.0);
            assert!(point[1] >= 7.0 && point[1] <= 24.0);
        }
    }

    #[test]
    fn test_empty_mask_traces_nothing() {
        let mask = GrayImage::new(16, 16);
        assert!(ImageprocContourTracer.trace(&mask).unwrap().is_empty());
    }
}
