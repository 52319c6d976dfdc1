//! # Vectorize - Label Rasters to Geographic Polygons
//!
//! The final processing stage: converts a label raster into polygon
//! geometries, one or more per surviving label value, with geodesic surface
//! areas and GeoJSON persistence.
//!
//! ## Processing steps
//!
//! 1. Collect the distinct non-zero label values and drop those below a
//!    percentile of the values present (de-noising heuristic, default 5th).
//! 2. Per surviving label: binary mask → contour tracing → containment
//!    hole detection.
//! 3. Georeference the pixel rings through the raster's affine transform,
//!    optionally simplify, and unproject to WGS84.
//! 4. Compute each polygon's geodesic area.
//!
//! ## Example
//!
//! ```rust,no_run
//! use terrabound_common::LabelRaster;
//! use vectorize::{VectorizeOptions, vectorize};
//!
//! let raster = LabelRaster::load("runs/demo/labels.png")?;
//! let segments = vectorize(&raster, &VectorizeOptions::default())?;
//! segments.save("runs/demo/segments.geojson")?;
//! # Ok::<(), vectorize::VectorizeError>(())
//! ```

pub mod algorithms;
pub mod error;
pub mod geojson_io;
pub mod traits;
pub mod types;

use image::{GrayImage, Luma};
use terrabound_common::{Crs, LabelRaster, mercator};

pub use algorithms::{ContainmentHoleDetector, ImageprocContourTracer};
pub use error::{Result, VectorizeError};
pub use geojson_io::SegmentProperties;
pub use traits::{ContourTracer, HoleDetector};
pub use types::{SegmentCollection, SegmentPolygon, SegmentShape};

/// Vectorization tuning
#[derive(Debug, Clone, Copy)]
pub struct VectorizeOptions {
    /// Percentile (0-100) of the non-zero label values below which labels
    /// are discarded. A de-noising heuristic over label *values*, not
    /// region sizes.
    pub percentile: f64,
    /// Douglas-Peucker tolerance in map units (meters for Web Mercator
    /// rasters); `None` keeps the traced rings as-is.
    pub simplify_tolerance: Option<f64>,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self { percentile: 5.0, simplify_tolerance: None }
    }
}

/// Label-raster vectorizer with pluggable tracing and hole detection
pub struct Vectorizer {
    tracer: Box<dyn ContourTracer>,
    hole_detector: Box<dyn HoleDetector>,
    options: VectorizeOptions,
}

impl Vectorizer {
    pub fn new(options: VectorizeOptions) -> Self {
        Self {
            tracer: Box::new(ImageprocContourTracer),
            hole_detector: Box::new(ContainmentHoleDetector),
            options,
        }
    }

    pub fn with_components(
        tracer: Box<dyn ContourTracer>,
        hole_detector: Box<dyn HoleDetector>,
        options: VectorizeOptions,
    ) -> Self {
        Self { tracer, hole_detector, options }
    }

    /// Extract polygons for every label value surviving the percentile
    /// filter. An all-background raster yields an empty collection.
    pub fn vectorize(&self, raster: &LabelRaster) -> Result<SegmentCollection> {
        let labels = raster.unique_labels();
        if labels.is_empty() {
            tracing::warn!("label raster holds no non-zero values");
            return Ok(SegmentCollection::default());
        }

        let surviving = algorithms::surviving_labels(&labels, self.options.percentile);
        tracing::info!(
            total = labels.len(),
            surviving = surviving.len(),
            percentile = self.options.percentile,
            "label percentile filter applied"
        );

        let mut polygons = Vec::new();
        for label in surviving {
            let mask = binary_mask(raster, label);
            let rings = self.tracer.trace(&mask)?;
            let shapes = self.hole_detector.detect(rings)?;

            for shape in shapes {
                if shape.is_degenerate() {
                    continue;
                }
                let mut mapped = georeference(&shape, raster);
                if let Some(tolerance) = self.options.simplify_tolerance {
                    mapped = mapped.simplified(tolerance);
                    if mapped.is_degenerate() {
                        continue;
                    }
                }
                let geographic = match raster.crs {
                    Crs::WebMercator => unproject(&mapped),
                    Crs::Wgs84 => mapped,
                };
                let area_m2 = geographic.geodesic_area_m2();
                polygons.push(SegmentPolygon {
                    id: u32::from(label),
                    shape: geographic,
                    area_m2,
                });
            }
        }

        tracing::info!(polygons = polygons.len(), "vectorization complete");
        Ok(SegmentCollection { polygons })
    }
}

/// One-shot vectorization with the default components
pub fn vectorize(raster: &LabelRaster, options: &VectorizeOptions) -> Result<SegmentCollection> {
    Vectorizer::new(*options).vectorize(raster)
}

fn binary_mask(raster: &LabelRaster, label: u16) -> GrayImage {
    let mut mask = GrayImage::new(raster.width(), raster.height());
    for (x, y, pixel) in raster.labels.enumerate_pixels() {
        if pixel[0] == label {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

/// Pixel rings to map coordinates through the raster transform, sampling at
/// cell centers.
fn georeference(shape: &SegmentShape, raster: &LabelRaster) -> SegmentShape {
    let map_ring = |ring: &Vec<[f64; 2]>| {
        ring.iter()
            .map(|&[col, row]| {
                let (x, y) = raster.transform.pixel_to_map(col + 0.5, row + 0.5);
                [x, y]
            })
            .collect::<Vec<_>>()
    };
    SegmentShape {
        exterior: map_ring(&shape.exterior),
        holes: shape.holes.iter().map(map_ring).collect(),
    }
}

/// Web Mercator meters to WGS84 degrees
fn unproject(shape: &SegmentShape) -> SegmentShape {
    let convert = |ring: &Vec<[f64; 2]>| {
        ring.iter()
            .map(|&[x, y]| [mercator::x_to_lon(x), mercator::y_to_lat(y)])
            .collect::<Vec<_>>()
    };
    SegmentShape {
        exterior: convert(&shape.exterior),
        holes: shape.holes.iter().map(convert).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use terrabound_common::{LonLatBBox, RasterTransform};

    /// 64x64 raster over a 0.1-degree box with two labeled squares
    fn sample_raster(label_a: u16, label_b: u16) -> LabelRaster {
        let bounds = LonLatBBox::new(20.0, 10.0, 20.1, 10.1).unwrap().to_mercator();
        let transform = RasterTransform::north_up(&bounds, 64, 64);

        let mut labels = ImageBuffer::new(64, 64);
        for y in 4..20 {
            for x in 4..20 {
                labels.put_pixel(x, y, Luma([label_a]));
            }
        }
        for y in 32..60 {
            for x in 32..60 {
                labels.put_pixel(x, y, Luma([label_b]));
            }
        }
        LabelRaster::new(labels, Crs::WebMercator, transform).unwrap()
    }

    fn keep_all() -> VectorizeOptions {
        VectorizeOptions { percentile: 0.0, simplify_tolerance: None }
    }

    #[test]
    fn test_ids_are_subset_of_label_values() {
        let raster = sample_raster(3, 7);
        let segments = vectorize(&raster, &keep_all()).unwrap();

        assert!(!segments.is_empty());
        for id in segments.ids() {
            assert!(id == 3 || id == 7, "unexpected id {id}");
        }
    }

    #[test]
    fn test_geometry_lands_inside_source_bbox() {
        let raster = sample_raster(3, 7);
        let segments = vectorize(&raster, &keep_all()).unwrap();

        for polygon in &segments.polygons {
            for &[lon, lat] in &polygon.shape.exterior {
                assert!((19.99..=20.11).contains(&lon), "lon {lon} out of range");
                assert!((9.99..=10.11).contains(&lat), "lat {lat} out of range");
            }
            assert!(polygon.area_m2 > 0.0);
        }
    }

    #[test]
    fn test_percentile_filter_drops_lowest_label() {
        // Values 3 and 7: the 5th percentile cutoff (3.2) discards label 3
        let raster = sample_raster(3, 7);
        let segments = vectorize(&raster, &VectorizeOptions::default()).unwrap();

        assert_eq!(segments.ids(), vec![7]);
    }

    #[test]
    fn test_empty_raster_yields_empty_collection() {
        let bounds = LonLatBBox::new(20.0, 10.0, 20.1, 10.1).unwrap().to_mercator();
        let transform = RasterTransform::north_up(&bounds, 16, 16);
        let raster =
            LabelRaster::new(ImageBuffer::new(16, 16), Crs::WebMercator, transform).unwrap();

        let segments = vectorize(&raster, &VectorizeOptions::default()).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_donut_label_gets_a_hole() {
        let bounds = LonLatBBox::new(20.0, 10.0, 20.1, 10.1).unwrap().to_mercator();
        let transform = RasterTransform::north_up(&bounds, 64, 64);

        let mut labels = ImageBuffer::new(64, 64);
        for y in 4..60 {
            for x in 4..60 {
                let inside_hole = (24..40).contains(&x) && (24..40).contains(&y);
                if !inside_hole {
                    labels.put_pixel(x, y, Luma([5u16]));
                }
            }
        }
        let raster = LabelRaster::new(labels, Crs::WebMercator, transform).unwrap();

        let segments = vectorize(&raster, &keep_all()).unwrap();
        assert!(segments.polygons.iter().any(|p| p.shape.has_holes()));
    }

    #[test]
    fn test_simplification_reduces_vertex_count() {
        let raster = sample_raster(3, 7);
        let detailed = vectorize(&raster, &keep_all()).unwrap();
        let simplified = vectorize(
            &raster,
            &VectorizeOptions { percentile: 0.0, simplify_tolerance: Some(5.0) },
        )
        .unwrap();

        let count = |c: &SegmentCollection| {
            c.polygons.iter().map(|p| p.shape.exterior.len()).sum::<usize>()
        };
        assert!(count(&simplified) <= count(&detailed));
    }
}
