//! Georeferenced raster handles.
//!
//! Pixel data is stored in ordinary image files; the coordinate transform
//! travels in a JSON sidecar next to the pixels (`<stem>.meta.json`), so any
//! stage can recover the grid-to-map mapping without a GeoTIFF reader.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CommonError, Crs, MercatorBBox, Result};

/// North-up affine transform mapping grid cells to map coordinates.
///
/// `pixel_height` is negative: row indices grow southward while map Y grows
/// northward, matching the usual geotransform convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RasterTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl RasterTransform {
    /// Transform for a `width x height` grid laid north-up over `bounds`
    pub fn north_up(bounds: &MercatorBBox, width: u32, height: u32) -> Self {
        Self {
            origin_x: bounds.min_x,
            origin_y: bounds.max_y,
            pixel_width: bounds.width() / f64::from(width),
            pixel_height: -bounds.height() / f64::from(height),
        }
    }

    /// Map the (fractional) grid position to map coordinates
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Inverse of [`pixel_to_map`](Self::pixel_to_map)
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Extent covered by a `width x height` grid under this transform
    pub fn extent(&self, width: u32, height: u32) -> MercatorBBox {
        let (max_x, min_y) = self.pixel_to_map(f64::from(width), f64::from(height));
        MercatorBBox {
            min_x: self.origin_x,
            min_y,
            max_x,
            max_y: self.origin_y,
        }
    }
}

/// Georeferencing metadata persisted alongside raster pixels
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RasterMeta {
    pub width: u32,
    pub height: u32,
    pub crs: Crs,
    pub transform: RasterTransform,
}

fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("meta.json")
}

/// A raster image on disk plus its coordinate transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRaster {
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub crs: Crs,
    pub transform: RasterTransform,
}

impl GeoRaster {
    /// Path of the metadata sidecar for this raster
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path(&self.image_path)
    }

    /// Persist the metadata sidecar next to the pixel file
    pub fn write_sidecar(&self) -> Result<()> {
        let meta = RasterMeta {
            width: self.width,
            height: self.height,
            crs: self.crs,
            transform: self.transform,
        };
        let json = serde_json::to_string_pretty(&meta)?;
        std::fs::write(self.sidecar_path(), json)?;
        Ok(())
    }

    /// Open a raster by its pixel file path, reading the sidecar
    pub fn open<P: AsRef<Path>>(image_path: P) -> Result<Self> {
        let image_path = image_path.as_ref().to_path_buf();
        let sidecar = sidecar_path(&image_path);
        if !sidecar.exists() {
            return Err(CommonError::MissingSidecar {
                path: sidecar.display().to_string(),
            });
        }
        let meta: RasterMeta = serde_json::from_str(&std::fs::read_to_string(sidecar)?)?;
        Ok(Self {
            image_path,
            width: meta.width,
            height: meta.height,
            crs: meta.crs,
            transform: meta.transform,
        })
    }

    /// Load the pixel data as an RGB image
    pub fn load_pixels(&self) -> Result<RgbImage> {
        Ok(image::open(&self.image_path)?.to_rgb8())
    }
}

/// A label raster: one integer region id per cell, 0 for background.
///
/// Same grid dimensions as the imagery it was derived from, and carries the
/// same transform.
#[derive(Debug, Clone)]
pub struct LabelRaster {
    pub labels: ImageBuffer<Luma<u16>, Vec<u16>>,
    pub crs: Crs,
    pub transform: RasterTransform,
}

impl LabelRaster {
    pub fn new(labels: ImageBuffer<Luma<u16>, Vec<u16>>, crs: Crs, transform: RasterTransform) -> Result<Self> {
        let (width, height) = labels.dimensions();
        if width == 0 || height == 0 {
            return Err(CommonError::EmptyRaster { width, height });
        }
        Ok(Self { labels, crs, transform })
    }

    pub fn width(&self) -> u32 {
        self.labels.width()
    }

    pub fn height(&self) -> u32 {
        self.labels.height()
    }

    pub fn label_at(&self, x: u32, y: u32) -> u16 {
        self.labels.get_pixel(x, y)[0]
    }

    /// Sorted distinct non-zero label values present in the raster
    pub fn unique_labels(&self) -> Vec<u16> {
        let mut seen = vec![false; usize::from(u16::MAX) + 1];
        for pixel in self.labels.pixels() {
            seen[usize::from(pixel[0])] = true;
        }
        (1..=u16::MAX).filter(|&v| seen[usize::from(v)]).collect()
    }

    /// Save pixels as 16-bit grayscale PNG plus the metadata sidecar
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.labels.save(path)?;
        let meta = RasterMeta {
            width: self.width(),
            height: self.height(),
            crs: self.crs,
            transform: self.transform,
        };
        std::fs::write(sidecar_path(path), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    /// Load a label raster saved by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let sidecar = sidecar_path(path);
        if !sidecar.exists() {
            return Err(CommonError::MissingSidecar {
                path: sidecar.display().to_string(),
            });
        }
        let meta: RasterMeta = serde_json::from_str(&std::fs::read_to_string(sidecar)?)?;
        let labels = image::open(path)?.to_luma16();
        Self::new(labels, meta.crs, meta.transform)
    }
}
