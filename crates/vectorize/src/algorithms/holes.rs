use geo_types::{Coord, LineString, Polygon};

use crate::{error::Result, traits::HoleDetector, types::SegmentShape};

/// Containment-based hole detector: rings fully inside a larger ring become
/// that ring's holes. Works in whatever planar space the rings arrive in.
#[derive(Debug, Clone, Default)]
pub struct ContainmentHoleDetector;

impl HoleDetector for ContainmentHoleDetector {
    fn detect(&self, rings: Vec<Vec<[f64; 2]>>) -> Result<Vec<SegmentShape>> {
        use geo::{Area, Contains};

        let mut polygons: Vec<(Polygon<f64>, Vec<[f64; 2]>, f64)> = rings
            .into_iter()
            .map(|points| {
                let coords: Vec<Coord<f64>> = points.iter().map(|&[x, y]| Coord { x, y }).collect();
                let polygon = Polygon::new(LineString::new(coords), vec![]);
                let area = polygon.unsigned_area();
                (polygon, points, area)
            })
            .collect();

        // Largest first so outer boundaries claim their holes before the
        // holes are considered as candidate exteriors themselves.
        polygons.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut shapes = Vec::new();
        let mut used = vec![false; polygons.len()];

        for i in 0..polygons.len() {
            if used[i] {
                continue;
            }
            used[i] = true;

            let mut holes = Vec::new();
            for j in (i + 1)..polygons.len() {
                if used[j] {
                    continue;
                }
                if polygons[i].0.contains(&polygons[j].0) {
                    holes.push(polygons[j].1.clone());
                    used[j] = true;
                }
            }

            shapes.push(SegmentShape {
                exterior: polygons[i].1.clone(),
                holes,
            });
        }

        Ok(shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(min: f64, max: f64) -> Vec<[f64; 2]> {
        vec![[min, min], [max, min], [max, max], [min, max]]
    }

    #[test]
    fn test_nested_ring_becomes_hole() {
        let shapes = ContainmentHoleDetector
            .detect(vec![ring(0.0, 100.0), ring(25.0, 75.0)])
            .unwrap();

        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].holes.len(), 1);
    }

    #[test]
    fn test_disjoint_rings_stay_separate() {
        let shapes = ContainmentHoleDetector
            .detect(vec![ring(0.0, 10.0), ring(20.0, 30.0)])
            .unwrap();

        assert_eq!(shapes.len(), 2);
        assert!(shapes.iter().all(|s| s.holes.is_empty()));
    }
}
