//! Tile fetching, mosaic compositing, and georeferenced raster output.

use std::path::Path;

use image::{DynamicImage, RgbImage, imageops};
use terrabound_common::{Crs, GeoRaster, MercatorBBox, RasterTransform};

use crate::{
    ImageryError, Result,
    tiles::{TileRange, TileSource},
};

/// HTTP tile fetcher wrapping a shared reqwest client
#[derive(Debug, Clone)]
pub struct TileFetcher {
    client: reqwest::Client,
}

impl TileFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("terrabound/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch and decode every tile in `range`, compositing them onto a
    /// single mosaic canvas. Tiles are fetched strictly sequentially.
    pub async fn fetch_mosaic(&self, source: &TileSource, range: &TileRange) -> Result<RgbImage> {
        let ts = source.tile_size;
        let mut canvas = RgbImage::new(range.tiles_x() * ts, range.tiles_y() * ts);

        for tile in range.iter() {
            let url = source.url_for(tile);
            tracing::trace!(%url, "fetching tile");

            let bytes = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            let mut decoded = image::load_from_memory(&bytes)?.to_rgb8();
            if decoded.dimensions() != (ts, ts) {
                decoded = imageops::resize(&decoded, ts, ts, imageops::FilterType::Triangle);
            }

            let off_x = i64::from((tile.x - range.x_min) * ts);
            let off_y = i64::from((tile.y - range.y_min) * ts);
            imageops::replace(&mut canvas, &decoded, off_x, off_y);
        }

        Ok(canvas)
    }
}

impl Default for TileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel rectangle of `extent` within a mosaic covering `mosaic_bounds`
pub(crate) fn crop_window(
    mosaic_bounds: &MercatorBBox,
    extent: &MercatorBBox,
    meters_per_pixel: f64,
    canvas_width: u32,
    canvas_height: u32,
) -> (u32, u32, u32, u32) {
    let x = ((extent.min_x - mosaic_bounds.min_x) / meters_per_pixel).round().max(0.0) as u32;
    let y = ((mosaic_bounds.max_y - extent.max_y) / meters_per_pixel).round().max(0.0) as u32;
    let w = ((extent.width() / meters_per_pixel).round() as u32).max(1);
    let h = ((extent.height() / meters_per_pixel).round() as u32).max(1);

    let x = x.min(canvas_width.saturating_sub(1));
    let y = y.min(canvas_height.saturating_sub(1));
    (x, y, w.min(canvas_width - x), h.min(canvas_height - y))
}

/// Crop the mosaic to the region extent and resample to the output size
pub(crate) fn crop_to_extent(
    canvas: &RgbImage,
    mosaic_bounds: &MercatorBBox,
    extent: &MercatorBBox,
    meters_per_pixel: f64,
    out_width: u32,
    out_height: u32,
) -> RgbImage {
    let (x, y, w, h) = crop_window(
        mosaic_bounds,
        extent,
        meters_per_pixel,
        canvas.width(),
        canvas.height(),
    );
    let cropped = imageops::crop_imm(canvas, x, y, w, h).to_image();
    imageops::resize(&cropped, out_width, out_height, imageops::FilterType::Lanczos3)
}

/// Write the composed pixels as a 3-band TIFF plus transform sidecar.
///
/// The pixels are staged through a temp file in the destination directory and
/// only persisted on success, so a failed write leaves no partial artifact.
pub(crate) fn write_raster(
    pixels: RgbImage,
    output_path: &Path,
    extent: &MercatorBBox,
) -> Result<GeoRaster> {
    let (width, height) = pixels.dimensions();
    let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    DynamicImage::ImageRgb8(pixels).write_to(&mut staged, image::ImageFormat::Tiff)?;
    staged.persist(output_path).map_err(|e| ImageryError::Io(e.error))?;

    let raster = GeoRaster {
        image_path: output_path.to_path_buf(),
        width,
        height,
        crs: Crs::WebMercator,
        transform: RasterTransform::north_up(extent, width, height),
    };
    raster.write_sidecar()?;
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop_window_exact_alignment() {
        // Mosaic of 512x512 pixels covering 512m; extent is the middle 256m
        let mosaic = MercatorBBox::new(0.0, 0.0, 512.0, 512.0).unwrap();
        let extent = MercatorBBox::new(128.0, 128.0, 384.0, 384.0).unwrap();

        let (x, y, w, h) = crop_window(&mosaic, &extent, 1.0, 512, 512);
        assert_eq!((x, y, w, h), (128, 128, 256, 256));
    }

    #[test]
    fn test_crop_window_clamps_to_canvas() {
        let mosaic = MercatorBBox::new(0.0, 0.0, 512.0, 512.0).unwrap();
        let extent = MercatorBBox::new(500.0, 0.0, 600.0, 512.0).unwrap();

        let (x, _, w, _) = crop_window(&mosaic, &extent, 1.0, 512, 512);
        assert!(x + w <= 512);
    }

    #[test]
    fn test_write_raster_persists_pixels_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.tif");
        let extent = MercatorBBox::new(0.0, 0.0, 80.0, 40.0).unwrap();

        let mut pixels = RgbImage::new(8, 4);
        pixels.put_pixel(0, 0, Rgb([120, 30, 60]));
        let raster = write_raster(pixels, &path, &extent).unwrap();

        assert_eq!(raster.transform.pixel_width, 10.0);
        assert_eq!(raster.transform.pixel_height, -10.0);

        let reopened = GeoRaster::open(&path).unwrap();
        assert_eq!(reopened.width, 8);
        assert_eq!(reopened.height, 4);
        assert_eq!(reopened.transform, raster.transform);
        assert_eq!(reopened.load_pixels().unwrap().get_pixel(0, 0), &Rgb([120, 30, 60]));
    }
}
