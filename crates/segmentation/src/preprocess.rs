//! Image preparation for the SAM encoder.
//!
//! The encoder expects a fixed 1024x1024 NCHW float tensor: the source is
//! scaled so its longest side hits 1024, padded bottom-right to square, and
//! normalized with the SAM pixel statistics.

use image::{RgbImage, imageops};
use ndarray::Array4;

/// Encoder input edge length
pub const MODEL_SIZE: u32 = 1024;

/// SAM pixel mean (RGB)
pub const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
/// SAM pixel std (RGB)
pub const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// A preprocessed image plus the bookkeeping needed to map model-space
/// coordinates back onto the source grid.
#[derive(Debug)]
pub struct PreparedImage {
    /// `[1, 3, 1024, 1024]` normalized tensor
    pub tensor: Array4<f32>,
    /// Source dimensions before scaling
    pub source_width: u32,
    pub source_height: u32,
    /// Dimensions of the scaled (pre-padding) image inside the tensor
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl PreparedImage {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (source_width, source_height) = image.dimensions();

        let scale = f64::from(MODEL_SIZE) / f64::from(source_width.max(source_height));
        let scaled_width = ((f64::from(source_width) * scale).round() as u32).clamp(1, MODEL_SIZE);
        let scaled_height = ((f64::from(source_height) * scale).round() as u32).clamp(1, MODEL_SIZE);

        let scaled = imageops::resize(image, scaled_width, scaled_height, imageops::FilterType::Lanczos3);

        // Pad bottom-right to the square model size; padding stays at the
        // normalized value of black.
        let mut tensor = Array4::<f32>::zeros((1, 3, MODEL_SIZE as usize, MODEL_SIZE as usize));
        for channel in 0..3 {
            let fill = (0.0 - PIXEL_MEAN[channel]) / PIXEL_STD[channel];
            tensor
                .index_axis_mut(ndarray::Axis(1), channel)
                .fill(fill);
        }
        for (x, y, pixel) in scaled.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (f32::from(pixel[channel]) - PIXEL_MEAN[channel]) / PIXEL_STD[channel];
            }
        }

        Self {
            tensor,
            source_width,
            source_height,
            scaled_width,
            scaled_height,
        }
    }

    /// Scale factor from model space back to source pixels
    pub fn model_to_source_scale(&self) -> f64 {
        f64::from(self.source_width.max(self.source_height)) / f64::from(MODEL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_shape_and_scaled_dims() {
        let image = RgbImage::new(2048, 1024);
        let prepared = PreparedImage::from_rgb(&image);

        assert_eq!(prepared.tensor.shape(), &[1, 3, 1024, 1024]);
        assert_eq!(prepared.scaled_width, 1024);
        assert_eq!(prepared.scaled_height, 512);
    }

    #[test]
    fn test_normalization_applied() {
        let mut image = RgbImage::new(1024, 1024);
        image.put_pixel(0, 0, Rgb([255, 0, 128]));
        let prepared = PreparedImage::from_rgb(&image);

        let expected_r = (255.0 - PIXEL_MEAN[0]) / PIXEL_STD[0];
        assert!((prepared.tensor[[0, 0, 0, 0]] - expected_r).abs() < 1e-5);

        let expected_g = (0.0 - PIXEL_MEAN[1]) / PIXEL_STD[1];
        assert!((prepared.tensor[[0, 1, 0, 0]] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_padding_region_holds_black_fill() {
        // 512-wide source scales to 512x1024: columns >= 512 are padding
        let image = RgbImage::new(512, 1024);
        let prepared = PreparedImage::from_rgb(&image);

        let fill = (0.0 - PIXEL_MEAN[0]) / PIXEL_STD[0];
        assert!((prepared.tensor[[0, 0, 0, 1023]] - fill).abs() < 1e-5);
    }

    #[test]
    fn test_model_to_source_scale() {
        let image = RgbImage::new(4096, 2048);
        let prepared = PreparedImage::from_rgb(&image);
        assert!((prepared.model_to_source_scale() - 4.0).abs() < 1e-9);
    }
}
