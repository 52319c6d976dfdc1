use std::collections::BTreeMap;

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// A polygon ring set: one exterior ring plus any interior rings (holes).
///
/// Coordinate space depends on the stage: raster pixels as traced, map
/// coordinates after georeferencing. Persisted shapes are WGS84 `[lon, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentShape {
    /// The exterior boundary, `[lon, lat]` pairs
    pub exterior: Vec<[f64; 2]>,
    /// Interior boundaries (holes within the shape)
    pub holes: Vec<Vec<[f64; 2]>>,
}

impl SegmentShape {
    /// Convert to a geo-types polygon; `geo` closes open rings itself
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let ring = |points: &Vec<[f64; 2]>| {
            LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
        };
        Polygon::new(ring(&self.exterior), self.holes.iter().map(ring).collect())
    }

    /// Geodesic surface area in square meters (ellipsoidal formula),
    /// exterior minus holes. Coordinates must be WGS84 degrees.
    pub fn geodesic_area_m2(&self) -> f64 {
        use geo::GeodesicArea;
        self.to_geo_polygon().geodesic_area_unsigned()
    }

    /// Douglas-Peucker simplification of every ring
    pub fn simplified(&self, tolerance: f64) -> SegmentShape {
        use geo::Simplify;

        let simplify_ring = |points: &Vec<[f64; 2]>| {
            let coords: Vec<Coord<f64>> = points.iter().map(|&[x, y]| Coord { x, y }).collect();
            LineString::new(coords)
                .simplify(&tolerance)
                .coords()
                .map(|c| [c.x, c.y])
                .collect::<Vec<_>>()
        };

        let mut shape = SegmentShape {
            exterior: simplify_ring(&self.exterior),
            holes: self.holes.iter().map(simplify_ring).collect(),
        };
        shape.holes.retain(|hole| hole.len() >= 3);
        shape
    }

    /// A ring needs at least three distinct points to bound any area
    pub fn is_degenerate(&self) -> bool {
        self.exterior.len() < 3
    }

    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }
}

/// One vectorized segment: label id, geometry, and its computed area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPolygon {
    /// The label-raster value this polygon was traced from
    pub id: u32,
    pub shape: SegmentShape,
    pub area_m2: f64,
}

/// All polygons surviving one vectorization run.
///
/// A label may contribute several polygons when its mask has disjoint
/// parts, so ids are not unique across entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentCollection {
    pub polygons: Vec<SegmentPolygon>,
}

impl SegmentCollection {
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Distinct segment ids present, ascending
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.polygons.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Total area per requested id. Ids with no matching polygon report
    /// 0.0 rather than an error; disjoint parts of one label sum.
    pub fn areas_for(&self, ids: &[u32]) -> BTreeMap<u32, f64> {
        ids.iter()
            .map(|&id| {
                let area = self
                    .polygons
                    .iter()
                    .filter(|p| p.id == id)
                    .map(|p| p.area_m2)
                    .sum();
                (id, area)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min_lon: f64, min_lat: f64, side: f64) -> Vec<[f64; 2]> {
        vec![
            [min_lon, min_lat],
            [min_lon + side, min_lat],
            [min_lon + side, min_lat + side],
            [min_lon, min_lat + side],
        ]
    }

    #[test]
    fn test_geodesic_area_of_equatorial_square() {
        let shape = SegmentShape { exterior: square(0.0, 0.0, 0.1), holes: vec![] };
        let area = shape.geodesic_area_m2();

        // 0.1 deg is ~11.1 km at the equator, so ~1.23e8 m^2
        assert!(area > 1.1e8 && area < 1.35e8, "area was {area}");
    }

    #[test]
    fn test_holes_subtract_from_area() {
        let solid = SegmentShape { exterior: square(0.0, 0.0, 0.1), holes: vec![] };
        let pierced = SegmentShape {
            exterior: square(0.0, 0.0, 0.1),
            holes: vec![square(0.02, 0.02, 0.05)],
        };
        assert!(pierced.geodesic_area_m2() < solid.geodesic_area_m2());
    }

    #[test]
    fn test_simplified_drops_collinear_points() {
        let mut exterior = square(0.0, 0.0, 1.0);
        // Redundant midpoint on the bottom edge
        exterior.insert(1, [0.5, 0.0]);
        let shape = SegmentShape { exterior, holes: vec![] };

        let simplified = shape.simplified(1e-9);
        assert_eq!(simplified.exterior.len(), 4);
    }

    #[test]
    fn test_areas_for_unknown_id_is_zero() {
        let collection = SegmentCollection {
            polygons: vec![SegmentPolygon {
                id: 7,
                shape: SegmentShape { exterior: square(0.0, 0.0, 0.1), holes: vec![] },
                area_m2: 42.0,
            }],
        };

        let areas = collection.areas_for(&[7, 99]);
        assert_eq!(areas[&7], 42.0);
        assert_eq!(areas[&99], 0.0);
    }

    #[test]
    fn test_areas_sum_disjoint_parts_of_one_label() {
        let shape = SegmentShape { exterior: square(0.0, 0.0, 0.1), holes: vec![] };
        let collection = SegmentCollection {
            polygons: vec![
                SegmentPolygon { id: 3, shape: shape.clone(), area_m2: 10.0 },
                SegmentPolygon { id: 3, shape, area_m2: 5.0 },
            ],
        };
        assert_eq!(collection.areas_for(&[3])[&3], 15.0);
    }

    #[test]
    fn test_ids_deduplicated_and_sorted() {
        let shape = SegmentShape { exterior: square(0.0, 0.0, 0.1), holes: vec![] };
        let collection = SegmentCollection {
            polygons: vec![
                SegmentPolygon { id: 9, shape: shape.clone(), area_m2: 1.0 },
                SegmentPolygon { id: 2, shape: shape.clone(), area_m2: 1.0 },
                SegmentPolygon { id: 9, shape, area_m2: 1.0 },
            ],
        };
        assert_eq!(collection.ids(), vec![2, 9]);
    }
}
