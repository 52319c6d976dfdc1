//! Region definition: the first pipeline stage.
//!
//! A request's geographic bounding box becomes a single-feature
//! [`RegionRecord`] in Web Mercator, persisted as GeoJSON under the region's
//! name. Saving overwrites any prior record with the same name.

use std::path::{Path, PathBuf};

use geojson::{Feature, GeoJson, Geometry, Value};
use terrabound_common::{Crs, LonLatBBox, MercatorBBox};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegionError>;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Region name {0:?} is not a valid filesystem key")]
    InvalidName(String),

    #[error("No region record named {0:?}")]
    NotFound(String),

    #[error("Region file does not contain a single polygon feature")]
    MalformedRecord,

    #[error(transparent)]
    Bounds(#[from] terrabound_common::CommonError),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named rectangular region in Web Mercator
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub name: String,
    pub bounds: MercatorBBox,
}

impl RegionRecord {
    /// Build a record from a geographic bounding box, projecting it to
    /// EPSG:3857 for area-preserving tile rendering.
    pub fn from_bbox(name: impl Into<String>, bbox: LonLatBBox) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(RegionError::InvalidName(name));
        }
        Ok(Self { name, bounds: bbox.to_mercator() })
    }

    /// The record as a closed-ring GeoJSON polygon feature
    pub fn to_feature(&self) -> Feature {
        let b = &self.bounds;
        let ring = vec![
            vec![b.min_x, b.min_y],
            vec![b.max_x, b.min_y],
            vec![b.max_x, b.max_y],
            vec![b.min_x, b.max_y],
            vec![b.min_x, b.min_y],
        ];

        let mut properties = serde_json::Map::new();
        properties.insert("reg_name".to_string(), self.name.clone().into());
        properties.insert("crs".to_string(), Crs::WebMercator.code().into());

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    /// Recover a record from a feature written by [`to_feature`](Self::to_feature)
    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let name = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("reg_name"))
            .and_then(|v| v.as_str())
            .ok_or(RegionError::MalformedRecord)?
            .to_string();

        let rings = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Polygon(rings)) if !rings.is_empty() => rings,
            _ => return Err(RegionError::MalformedRecord),
        };

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for coord in &rings[0] {
            if coord.len() < 2 {
                return Err(RegionError::MalformedRecord);
            }
            min_x = min_x.min(coord[0]);
            min_y = min_y.min(coord[1]);
            max_x = max_x.max(coord[0]);
            max_y = max_y.max(coord[1]);
        }

        Ok(Self {
            name,
            bounds: MercatorBBox::new(min_x, min_y, max_x, max_y)?,
        })
    }
}

/// Directory of persisted region records, one GeoJSON file per name
#[derive(Debug, Clone)]
pub struct RegionStore {
    root: PathBuf,
}

impl RegionStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.geojson"))
    }

    /// Persist the record, replacing any prior record with the same name
    pub fn save(&self, record: &RegionRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.name);
        let geojson = GeoJson::Feature(record.to_feature());
        std::fs::write(&path, geojson.to_string())?;
        tracing::debug!(name = %record.name, path = %path.display(), "saved region record");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<RegionRecord> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(RegionError::NotFound(name.to_string()));
        }
        let geojson: GeoJson = std::fs::read_to_string(&path)?.parse()?;
        match geojson {
            GeoJson::Feature(feature) => RegionRecord::from_feature(&feature),
            _ => Err(RegionError::MalformedRecord),
        }
    }
}
