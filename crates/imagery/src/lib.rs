//! Imagery acquisition: the second pipeline stage.
//!
//! Renders remote XYZ map tiles covering a region's Web Mercator extent into
//! a fixed-width raster with an embedded coordinate transform. Height is
//! derived from the region's aspect ratio; the zoom level is chosen so the
//! fetched tiles meet the requested output resolution.
//!
//! ## Example
//!
//! ```rust,no_run
//! use imagery::{AcquireConfig, TileProvider, acquire};
//! use terrabound_common::MercatorBBox;
//!
//! # async fn run() -> imagery::Result<()> {
//! let extent = MercatorBBox::new(2_226_389.8, 1_118_889.9, 2_237_521.8, 1_130_195.4)?;
//! let raster = acquire(
//!     &extent,
//!     &TileProvider::GoogleSatellite.source(),
//!     &AcquireConfig::default(),
//!     "runs/demo/satellite.tif".as_ref(),
//! )
//! .await?;
//! assert_eq!(raster.width, 4096);
//! # Ok(())
//! # }
//! ```

pub mod render;
pub mod tiles;

use std::path::Path;

use terrabound_common::{GeoRaster, MercatorBBox};
use thiserror::Error;

pub use render::TileFetcher;
pub use tiles::{TileProvider, TileRange, TileSource};

pub type Result<T> = std::result::Result<T, ImageryError>;

#[derive(Error, Debug)]
pub enum ImageryError {
    #[error("Tile url template {template:?} is missing the {missing} placeholder")]
    InvalidTemplate { template: String, missing: &'static str },

    #[error("Requested output width must be non-zero")]
    ZeroWidth,

    #[error("Tile fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tile decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Geo(#[from] terrabound_common::CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Acquisition parameters. Width is the output raster width in pixels;
/// height always follows from the region's aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct AcquireConfig {
    pub width: u32,
    /// Force a specific tile zoom level instead of deriving one from the
    /// output resolution.
    pub zoom_override: Option<u8>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self { width: 4096, zoom_override: None }
    }
}

/// Output raster height preserving the extent's aspect ratio:
/// `round(width * extent_height / extent_width)`, at least one row.
pub fn output_height(extent: &MercatorBBox, width: u32) -> u32 {
    let h = (f64::from(width) * extent.height() / extent.width()).round() as u32;
    h.max(1)
}

/// Render tiles covering `extent` into a georeferenced raster at
/// `output_path`.
///
/// Failures (invalid template, unreachable source, decode errors) surface as
/// [`ImageryError`]; partially written output is cleaned up by the staging
/// temp file.
pub async fn acquire(
    extent: &MercatorBBox,
    source: &TileSource,
    config: &AcquireConfig,
    output_path: &Path,
) -> Result<GeoRaster> {
    source.validate()?;
    if config.width == 0 {
        return Err(ImageryError::ZeroWidth);
    }

    let width = config.width;
    let height = output_height(extent, width);
    let pixel_size = extent.width() / f64::from(width);
    let zoom = config
        .zoom_override
        .unwrap_or_else(|| source.zoom_for_resolution(pixel_size))
        .clamp(source.min_zoom, source.max_zoom);

    let range = TileRange::covering(extent, zoom);
    tracing::info!(
        zoom,
        tiles = range.count(),
        out = %format!("{width}x{height}"),
        "rendering satellite imagery"
    );

    let fetcher = TileFetcher::new();
    let canvas = fetcher.fetch_mosaic(source, &range).await?;

    let mosaic_bounds = range.bounds();
    let meters_per_pixel = mosaic_bounds.width() / f64::from(canvas.width());
    let pixels = render::crop_to_extent(&canvas, &mosaic_bounds, extent, meters_per_pixel, width, height);

    let raster = render::write_raster(pixels, output_path, extent)?;
    tracing::info!(
        path = %raster.image_path.display(),
        resolution = format!("{:.2} m/px", raster.transform.pixel_width),
        "satellite raster saved"
    );
    Ok(raster)
}
