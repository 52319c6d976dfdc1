//! Human-viewable color overlay of a label raster on the source imagery.

use image::{ImageBuffer, Luma, Rgb, RgbImage};

/// Blend weight of the label colors over the base pixels
const OVERLAY_ALPHA: f32 = 0.3;

/// Deterministic palette color for a label id. Hues walk the golden angle
/// so neighbouring ids land far apart on the color wheel.
pub fn label_color(id: u16) -> [u8; 3] {
    let hue = (f32::from(id) * 137.508) % 360.0;
    hsv_to_rgb(hue, 0.75, 0.95)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match hue as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

/// Alpha-blend each labeled cell's palette color over the base imagery.
/// Background cells keep the original pixels.
pub fn render_overlay(base: &RgbImage, labels: &ImageBuffer<Luma<u16>, Vec<u16>>) -> RgbImage {
    let mut overlay = base.clone();
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        let id = labels.get_pixel(x, y)[0];
        if id == 0 {
            continue;
        }
        let color = label_color(id);
        for channel in 0..3 {
            pixel[channel] = (f32::from(pixel[channel]) * (1.0 - OVERLAY_ALPHA)
                + f32::from(color[channel]) * OVERLAY_ALPHA) as u8;
        }
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ids_get_distinct_colors() {
        assert_ne!(label_color(1), label_color(2));
        assert_ne!(label_color(2), label_color(3));
    }

    #[test]
    fn test_background_untouched_and_labels_tinted() {
        let mut base = RgbImage::new(2, 1);
        base.put_pixel(0, 0, Rgb([100, 100, 100]));
        base.put_pixel(1, 0, Rgb([100, 100, 100]));

        let mut labels = ImageBuffer::new(2, 1);
        labels.put_pixel(1, 0, Luma([4u16]));

        let overlay = render_overlay(&base, &labels);
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([100, 100, 100]));
        assert_ne!(overlay.get_pixel(1, 0), &Rgb([100, 100, 100]));
    }
}
