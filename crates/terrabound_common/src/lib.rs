//! # TerraBound Common - Shared Geodata Types
//!
//! A foundational library providing the bounding-box, projection, and raster
//! georeferencing types shared by the TerraBound pipeline crates.
//!
//! ## Example
//!
//! ```rust
//! use terrabound_common::{LonLatBBox, RasterTransform};
//!
//! // A geographic bounding box (WGS84 degrees)
//! let bbox = LonLatBBox::new(20.0, 10.0, 20.1, 10.1).unwrap();
//!
//! // Reproject to Web Mercator for area-preserving tile rendering
//! let merc = bbox.to_mercator();
//! assert!(merc.width() > 0.0 && merc.height() > 0.0);
//!
//! // A north-up affine transform mapping a 1024x768 grid onto that extent
//! let transform = RasterTransform::north_up(&merc, 1024, 768);
//! let (x, y) = transform.pixel_to_map(0.0, 0.0);
//! assert_eq!((x, y), (merc.min_x, merc.max_y));
//! ```

pub mod mercator;
pub mod raster;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use raster::{GeoRaster, LabelRaster, RasterTransform};

/// Result type for common geodata operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Standard error type for the shared geodata layer
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid bounds on {axis} axis: min {min} >= max {max}")]
    InvalidBounds { axis: &'static str, min: f64, max: f64 },

    #[error("Latitude {0} outside the Web Mercator domain")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("Raster has zero dimension: {width}x{height}")]
    EmptyRaster { width: u32, height: u32 },

    #[error("Missing raster metadata sidecar: {path}")]
    MissingSidecar { path: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coordinate reference systems used by the pipeline.
///
/// Regions and rasters live in Web Mercator; served polygon geometry is
/// always WGS84.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Crs {
    #[serde(rename = "EPSG:4326")]
    Wgs84,
    #[serde(rename = "EPSG:3857")]
    WebMercator,
}

impl Crs {
    pub fn code(&self) -> &'static str {
        match self {
            Crs::Wgs84 => "EPSG:4326",
            Crs::WebMercator => "EPSG:3857",
        }
    }
}

/// A geographic bounding box in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LonLatBBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl LonLatBBox {
    /// Create a new bounding box, enforcing min < max on both axes and the
    /// Web Mercator latitude domain.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        if min_lon >= max_lon {
            return Err(CommonError::InvalidBounds { axis: "longitude", min: min_lon, max: max_lon });
        }
        if min_lat >= max_lat {
            return Err(CommonError::InvalidBounds { axis: "latitude", min: min_lat, max: max_lat });
        }
        for lon in [min_lon, max_lon] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(CommonError::LongitudeOutOfRange(lon));
            }
        }
        for lat in [min_lat, max_lat] {
            if lat.abs() > mercator::MAX_LAT {
                return Err(CommonError::LatitudeOutOfRange(lat));
            }
        }
        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Project to Web Mercator meters
    pub fn to_mercator(&self) -> MercatorBBox {
        MercatorBBox {
            min_x: mercator::lon_to_x(self.min_lon),
            min_y: mercator::lat_to_y(self.min_lat),
            max_x: mercator::lon_to_x(self.max_lon),
            max_y: mercator::lat_to_y(self.max_lat),
        }
    }
}

/// A bounding box in Web Mercator (EPSG:3857) meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MercatorBBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MercatorBBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if min_x >= max_x {
            return Err(CommonError::InvalidBounds { axis: "x", min: min_x, max: max_x });
        }
        if min_y >= max_y {
            return Err(CommonError::InvalidBounds { axis: "y", min: min_y, max: max_y });
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Unproject back to WGS84 degrees
    pub fn to_lon_lat(&self) -> LonLatBBox {
        LonLatBBox {
            min_lon: mercator::x_to_lon(self.min_x),
            min_lat: mercator::y_to_lat(self.min_y),
            max_lon: mercator::x_to_lon(self.max_x),
            max_lat: mercator::y_to_lat(self.max_y),
        }
    }
}
