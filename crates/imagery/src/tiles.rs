//! XYZ tile scheme arithmetic and tile source definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};
use terrabound_common::{MercatorBBox, mercator::HALF_EARTH};

use crate::{ImageryError, Result};

/// Full Web Mercator world extent in meters
const WORLD: f64 = 2.0 * HALF_EARTH;

/// Well-known tile providers selectable by name in configuration
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TileProvider {
    /// Google satellite layer
    GoogleSatellite,
    /// OpenStreetMap standard raster tiles
    OpenStreetMap,
    /// Esri world imagery tiles
    EsriWorldImagery,
}

impl TileProvider {
    pub fn source(&self) -> TileSource {
        match self {
            TileProvider::GoogleSatellite => TileSource {
                url_template: "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}".to_string(),
                min_zoom: 0,
                max_zoom: 20,
                tile_size: 256,
            },
            TileProvider::OpenStreetMap => TileSource {
                url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                min_zoom: 0,
                max_zoom: 19,
                tile_size: 256,
            },
            TileProvider::EsriWorldImagery => TileSource {
                url_template:
                    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
                        .to_string(),
                min_zoom: 0,
                max_zoom: 19,
                tile_size: 256,
            },
        }
    }
}

/// An XYZ tile endpoint: url template with `{x}`/`{y}`/`{z}` placeholders
/// plus the zoom range the server actually carries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
}

impl TileSource {
    /// Check the template carries all three placeholders
    pub fn validate(&self) -> Result<()> {
        for placeholder in ["{x}", "{y}", "{z}"] {
            if !self.url_template.contains(placeholder) {
                return Err(ImageryError::InvalidTemplate {
                    template: self.url_template.clone(),
                    missing: placeholder,
                });
            }
        }
        Ok(())
    }

    pub fn url_for(&self, tile: TileId) -> String {
        self.url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// Smallest zoom level whose tile resolution meets `pixel_size`
    /// (meters per output pixel), clamped to the source's zoom range.
    pub fn zoom_for_resolution(&self, pixel_size: f64) -> u8 {
        let ideal = (WORLD / (f64::from(self.tile_size) * pixel_size)).log2().ceil();
        let clamped = ideal.clamp(f64::from(self.min_zoom), f64::from(self.max_zoom));
        clamped as u8
    }
}

/// A single XYZ tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Web Mercator extent of this tile
    pub fn bounds(&self) -> MercatorBBox {
        let n = f64::from(1u32 << self.z);
        let span = WORLD / n;
        let min_x = -HALF_EARTH + f64::from(self.x) * span;
        let max_y = HALF_EARTH - f64::from(self.y) * span;
        MercatorBBox {
            min_x,
            min_y: max_y - span,
            max_x: min_x + span,
            max_y,
        }
    }
}

/// The inclusive rectangle of tiles covering an extent at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    pub fn covering(bounds: &MercatorBBox, z: u8) -> Self {
        let n = 1u32 << z;
        let span = WORLD / f64::from(n);
        let clamp = |v: f64| (v.floor() as i64).clamp(0, i64::from(n) - 1) as u32;

        Self {
            z,
            x_min: clamp((bounds.min_x + HALF_EARTH) / span),
            x_max: clamp((bounds.max_x + HALF_EARTH) / span),
            y_min: clamp((HALF_EARTH - bounds.max_y) / span),
            y_max: clamp((HALF_EARTH - bounds.min_y) / span),
        }
    }

    pub fn tiles_x(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn tiles_y(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    pub fn count(&self) -> usize {
        self.tiles_x() as usize * self.tiles_y() as usize
    }

    /// Row-major iteration over the tile addresses
    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        let z = self.z;
        (self.y_min..=self.y_max).flat_map(move |y| {
            (self.x_min..=self.x_max).map(move |x| TileId { z, x, y })
        })
    }

    /// Web Mercator extent of the full tile mosaic
    pub fn bounds(&self) -> MercatorBBox {
        let top_left = TileId { z: self.z, x: self.x_min, y: self.y_min }.bounds();
        let bottom_right = TileId { z: self.z, x: self.x_max, y: self.y_max }.bounds();
        MercatorBBox {
            min_x: top_left.min_x,
            min_y: bottom_right.min_y,
            max_x: bottom_right.max_x,
            max_y: top_left.max_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn world() -> MercatorBBox {
        MercatorBBox {
            min_x: -HALF_EARTH,
            min_y: -HALF_EARTH,
            max_x: HALF_EARTH,
            max_y: HALF_EARTH,
        }
    }

    #[test]
    fn test_zoom_zero_is_one_tile() {
        let range = TileRange::covering(&world(), 0);
        assert_eq!((range.x_min, range.x_max, range.y_min, range.y_max), (0, 0, 0, 0));
        assert_eq!(range.count(), 1);

        let tile = TileId { z: 0, x: 0, y: 0 };
        assert_eq!(tile.bounds(), world());
    }

    #[test]
    fn test_range_bounds_contain_extent() {
        let extent = MercatorBBox::new(1_000_000.0, 2_000_000.0, 1_050_000.0, 2_030_000.0).unwrap();
        let range = TileRange::covering(&extent, 12);
        let mosaic = range.bounds();

        assert!(mosaic.min_x <= extent.min_x && mosaic.max_x >= extent.max_x);
        assert!(mosaic.min_y <= extent.min_y && mosaic.max_y >= extent.max_y);
    }

    #[test]
    fn test_url_substitution() {
        let source = TileProvider::OpenStreetMap.source();
        let url = source.url_for(TileId { z: 3, x: 4, y: 5 });
        assert_eq!(url, "https://tile.openstreetmap.org/3/4/5.png");
    }

    #[test]
    fn test_template_validation() {
        let mut source = TileProvider::OpenStreetMap.source();
        source.validate().unwrap();

        source.url_template = "https://example.com/{z}/{x}.png".to_string();
        assert!(matches!(
            source.validate(),
            Err(ImageryError::InvalidTemplate { missing: "{y}", .. })
        ));
    }

    #[test]
    fn test_zoom_selection_clamps_to_range() {
        let source = TileProvider::GoogleSatellite.source();
        // Absurdly fine resolution clamps to max_zoom
        assert_eq!(source.zoom_for_resolution(1e-6), 20);
        // Absurdly coarse resolution clamps to min_zoom
        assert_eq!(source.zoom_for_resolution(1e9), 0);
        // One tile covering the world: exactly zoom 0 at world/256 per pixel
        assert_eq!(source.zoom_for_resolution(2.0 * HALF_EARTH / 256.0), 0);
    }

    #[test]
    fn test_provider_parses_from_config_string() {
        assert_eq!(
            TileProvider::from_str("google_satellite").unwrap(),
            TileProvider::GoogleSatellite
        );
        assert!(TileProvider::from_str("bing").is_err());
    }
}
