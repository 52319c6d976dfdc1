//! GeoJSON persistence for segment collections.
//!
//! Segments are stored as a WGS84 `FeatureCollection`, one feature per
//! polygon, with typed `segment_id` / `area_m2` properties. The file is the
//! single read source for both serving paths.

use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    error::{Result, VectorizeError},
    types::{SegmentCollection, SegmentPolygon, SegmentShape},
};

/// Properties carried by every segment feature
#[derive(Serialize, Deserialize, Debug, Clone, TS, JsonSchema)]
#[ts(export)]
pub struct SegmentProperties {
    #[schemars(description = "Label-raster value this polygon was traced from")]
    pub segment_id: u32,
    #[schemars(description = "Geodesic surface area in square meters")]
    pub area_m2: f64,
}

fn closed_ring(points: &[[f64; 2]]) -> Vec<Vec<f64>> {
    let mut ring: Vec<Vec<f64>> = points.iter().map(|&[x, y]| vec![x, y]).collect();
    if ring.first() != ring.last()
        && let Some(first) = ring.first().cloned()
    {
        ring.push(first);
    }
    ring
}

fn parse_ring(ring: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
    let mut points = ring
        .iter()
        .map(|coord| {
            if coord.len() < 2 {
                return Err(VectorizeError::GeometricComputation(
                    "ring coordinate with fewer than two values".to_string(),
                ));
            }
            Ok([coord[0], coord[1]])
        })
        .collect::<Result<Vec<_>>>()?;
    // Stored rings are closed; in-memory rings are not
    if points.len() > 3 && points.first() == points.last() {
        points.pop();
    }
    Ok(points)
}

impl SegmentCollection {
    /// The collection as a geographic JSON feature collection, each feature
    /// annotated with its id and geodesic area.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .polygons
            .iter()
            .map(|polygon| {
                let mut rings = vec![closed_ring(&polygon.shape.exterior)];
                rings.extend(polygon.shape.holes.iter().map(|h| closed_ring(h)));

                let properties = SegmentProperties {
                    segment_id: polygon.id,
                    area_m2: polygon.area_m2,
                };

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(rings))),
                    id: None,
                    properties: serde_json::to_value(properties)
                        .ok()
                        .and_then(|v| v.as_object().cloned()),
                    foreign_members: None,
                }
            })
            .collect();

        let mut foreign_members = serde_json::Map::new();
        foreign_members.insert("segment_count".to_string(), self.polygons.len().into());
        foreign_members.insert("crs_code".to_string(), "EPSG:4326".into());

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }

    /// Rebuild the collection from a feature collection written by
    /// [`to_feature_collection`](Self::to_feature_collection)
    pub fn from_feature_collection(collection: &FeatureCollection) -> Result<Self> {
        let mut polygons = Vec::new();

        for feature in &collection.features {
            let properties: SegmentProperties = feature
                .properties
                .as_ref()
                .map(|p| serde_json::from_value(serde_json::Value::Object(p.clone())))
                .transpose()?
                .ok_or_else(|| {
                    VectorizeError::GeometricComputation("feature without segment properties".to_string())
                })?;

            let rings = match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::Polygon(rings)) if !rings.is_empty() => rings,
                _ => continue,
            };

            polygons.push(SegmentPolygon {
                id: properties.segment_id,
                shape: SegmentShape {
                    exterior: parse_ring(&rings[0])?,
                    holes: rings[1..].iter().map(|r| parse_ring(r)).collect::<Result<Vec<_>>>()?,
                },
                area_m2: properties.area_m2,
            });
        }

        Ok(SegmentCollection { polygons })
    }

    /// Save as a GeoJSON file, overwriting any previous collection
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let geojson = GeoJson::FeatureCollection(self.to_feature_collection());
        std::fs::write(path.as_ref(), geojson.to_string())?;
        tracing::debug!(
            path = %path.as_ref().display(),
            polygons = self.polygons.len(),
            "segment collection saved"
        );
        Ok(())
    }

    /// Load a previously saved collection; a missing file is `NotFound`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VectorizeError::NotFound(path.to_path_buf()));
        }
        let geojson: GeoJson = std::fs::read_to_string(path)?.parse()?;
        match geojson {
            GeoJson::FeatureCollection(fc) => Self::from_feature_collection(&fc),
            _ => Err(VectorizeError::GeometricComputation(
                "segment file is not a FeatureCollection".to_string(),
            )),
        }
    }
}
