//! Automatic mask generation: prompt gridding, candidate filtering,
//! duplicate suppression, and label raster assembly.
//!
//! Everything here is plain array work so it stays testable without model
//! weights; the ONNX sessions only supply the per-prompt mask logits.

use image::{ImageBuffer, Luma, imageops};
use ndarray::ArrayView2;

/// Fixed generation constants, tuned for agricultural plot detection.
/// Deliberately not exposed at the request boundary.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MaskGenConfig {
    /// Prompt grid density: `points_per_side^2` point prompts per image
    pub points_per_side: u32,
    /// Keep masks whose model-predicted IoU meets this bar
    pub pred_iou_thresh: f32,
    /// Keep masks whose stability score meets this bar
    pub stability_score_thresh: f32,
    /// Logit offset used when computing the stability score
    pub stability_score_offset: f32,
    /// Logit cutoff for binarizing masks
    pub mask_threshold: f32,
    /// Minimum region size in source-resolution pixels
    pub min_mask_region_area: u32,
    /// Bounding-box IoU above which two candidates count as duplicates
    pub box_nms_thresh: f32,
}

impl Default for MaskGenConfig {
    fn default() -> Self {
        Self {
            points_per_side: 24,
            pred_iou_thresh: 0.90,
            stability_score_thresh: 0.95,
            stability_score_offset: 1.0,
            mask_threshold: 0.0,
            min_mask_region_area: 5000,
            box_nms_thresh: 0.7,
        }
    }
}

/// Evenly spaced point prompts over the scaled image area (model-space
/// pixel coordinates, cell centers).
pub fn grid_points(points_per_side: u32, width: u32, height: u32) -> Vec<[f32; 2]> {
    let side = points_per_side.max(1);
    let mut points = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            points.push([
                (col as f32 + 0.5) * width as f32 / side as f32,
                (row as f32 + 0.5) * height as f32 / side as f32,
            ]);
        }
    }
    points
}

/// Axis-aligned pixel bounding box, inclusive corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    fn area(&self) -> u64 {
        u64::from(self.x1 - self.x0 + 1) * u64::from(self.y1 - self.y0 + 1)
    }

    /// Intersection-over-union of two boxes
    pub fn iou(&self, other: &PixelBox) -> f32 {
        let ix0 = self.x0.max(other.x0);
        let iy0 = self.y0.max(other.y0);
        let ix1 = self.x1.min(other.x1);
        let iy1 = self.y1.min(other.y1);
        if ix0 > ix1 || iy0 > iy1 {
            return 0.0;
        }
        let intersection = u64::from(ix1 - ix0 + 1) * u64::from(iy1 - iy0 + 1);
        let union = self.area() + other.area() - intersection;
        intersection as f32 / union as f32
    }
}

/// One binarized mask proposal with its quality scores
#[derive(Debug, Clone)]
pub struct CandidateMask {
    pub mask: Vec<bool>,
    pub width: u32,
    pub height: u32,
    pub area: usize,
    pub bbox: PixelBox,
    pub pred_iou: f32,
    pub stability: f32,
}

impl CandidateMask {
    /// Binarize one mask's logits and score it. Returns `None` for an empty
    /// mask.
    pub fn from_logits(logits: ArrayView2<'_, f32>, pred_iou: f32, config: &MaskGenConfig) -> Option<Self> {
        let (height, width) = (logits.nrows() as u32, logits.ncols() as u32);
        let mut mask = vec![false; (width * height) as usize];
        let mut area = 0usize;
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);

        for ((row, col), &logit) in logits.indexed_iter() {
            if logit > config.mask_threshold {
                mask[row * width as usize + col] = true;
                area += 1;
                x0 = x0.min(col as u32);
                y0 = y0.min(row as u32);
                x1 = x1.max(col as u32);
                y1 = y1.max(row as u32);
            }
        }
        if area == 0 {
            return None;
        }

        Some(Self {
            mask,
            width,
            height,
            area,
            bbox: PixelBox { x0, y0, x1, y1 },
            pred_iou,
            stability: stability_score(logits, config.mask_threshold, config.stability_score_offset),
        })
    }
}

/// Ratio of the mask's area when binarized at a raised vs. lowered cutoff.
/// Masks whose extent barely moves under the shifted threshold are stable.
pub fn stability_score(logits: ArrayView2<'_, f32>, threshold: f32, offset: f32) -> f32 {
    let mut high = 0u64;
    let mut low = 0u64;
    for &logit in logits.iter() {
        if logit > threshold + offset {
            high += 1;
        }
        if logit > threshold - offset {
            low += 1;
        }
    }
    if low == 0 { 0.0 } else { high as f32 / low as f32 }
}

/// Drop candidates failing the quality bars, then suppress duplicates by
/// greedy bounding-box NMS in descending predicted-IoU order.
pub fn filter_candidates(
    mut candidates: Vec<CandidateMask>,
    min_area_model_px: usize,
    config: &MaskGenConfig,
) -> Vec<CandidateMask> {
    candidates.retain(|c| {
        c.pred_iou >= config.pred_iou_thresh
            && c.stability >= config.stability_score_thresh
            && c.area >= min_area_model_px
    });

    candidates.sort_by(|a, b| b.pred_iou.partial_cmp(&a.pred_iou).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<CandidateMask> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.bbox.iou(&candidate.bbox) <= config.box_nms_thresh) {
            kept.push(candidate);
        }
    }
    kept
}

/// Paint the surviving candidates into a label image. Candidates are
/// written in descending area order so smaller regions stay visible where
/// masks overlap; ids run 1..=N in paint order, 0 is background.
pub fn assemble_labels(
    mut kept: Vec<CandidateMask>,
    width: u32,
    height: u32,
) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    kept.sort_by(|a, b| b.area.cmp(&a.area));

    let mut labels = ImageBuffer::<Luma<u16>, Vec<u16>>::new(width, height);
    for (index, candidate) in kept.iter().enumerate() {
        let id = (index + 1).min(usize::from(u16::MAX)) as u16;
        for y in 0..candidate.height.min(height) {
            for x in 0..candidate.width.min(width) {
                if candidate.mask[(y * candidate.width + x) as usize] {
                    labels.put_pixel(x, y, Luma([id]));
                }
            }
        }
    }
    labels
}

/// Nearest-neighbour upscale of a label image to the source grid size;
/// nearest sampling keeps ids intact.
pub fn upscale_labels(
    labels: &ImageBuffer<Luma<u16>, Vec<u16>>,
    width: u32,
    height: u32,
) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    if labels.dimensions() == (width, height) {
        return labels.clone();
    }
    imageops::resize(labels, width, height, imageops::FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn logits_square(size: usize, fill: f32, x0: usize, y0: usize, x1: usize, y1: usize) -> Array2<f32> {
        let mut logits = Array2::from_elem((size, size), -10.0);
        for row in y0..=y1 {
            for col in x0..=x1 {
                logits[[row, col]] = fill;
            }
        }
        logits
    }

    #[test]
    fn test_grid_points_count_and_coverage() {
        let points = grid_points(24, 1024, 512);
        assert_eq!(points.len(), 576);
        assert!(points.iter().all(|p| p[0] > 0.0 && p[0] < 1024.0));
        assert!(points.iter().all(|p| p[1] > 0.0 && p[1] < 512.0));
    }

    #[test]
    fn test_candidate_from_logits_bbox_and_area() {
        let logits = logits_square(16, 5.0, 2, 3, 9, 12);
        let candidate =
            CandidateMask::from_logits(logits.view(), 0.95, &MaskGenConfig::default()).unwrap();

        assert_eq!(candidate.area, 8 * 10);
        assert_eq!(candidate.bbox, PixelBox { x0: 2, y0: 3, x1: 9, y1: 12 });
    }

    #[test]
    fn test_empty_logits_yield_no_candidate() {
        let logits = Array2::from_elem((8, 8), -10.0);
        assert!(CandidateMask::from_logits(logits.view(), 0.99, &MaskGenConfig::default()).is_none());
    }

    #[test]
    fn test_stability_score_sharp_vs_soft_mask() {
        // Sharp mask: all logits far from the cutoff on either side
        let sharp = logits_square(8, 10.0, 0, 0, 3, 3);
        assert!((stability_score(sharp.view(), 0.0, 1.0) - 1.0).abs() < 1e-6);

        // Soft mask: interior far above, rim between the offset cutoffs
        let mut soft = logits_square(8, 10.0, 0, 0, 3, 3);
        for col in 0..4 {
            soft[[4, col]] = 0.5;
        }
        let score = stability_score(soft.view(), 0.0, 1.0);
        assert!(score < 1.0 && score > 0.5);
    }

    #[test]
    fn test_box_iou() {
        let a = PixelBox { x0: 0, y0: 0, x1: 9, y1: 9 };
        let b = PixelBox { x0: 5, y0: 0, x1: 14, y1: 9 };
        let iou = a.iou(&b);
        // 50 px overlap of 150 px union
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);

        let disjoint = PixelBox { x0: 20, y0: 20, x1: 25, y1: 25 };
        assert_eq!(a.iou(&disjoint), 0.0);
    }

    #[test]
    fn test_filter_drops_low_quality_and_duplicates() {
        let config = MaskGenConfig {
            min_mask_region_area: 0,
            ..MaskGenConfig::default()
        };

        let good = CandidateMask::from_logits(logits_square(16, 5.0, 0, 0, 7, 7).view(), 0.96, &config).unwrap();
        let duplicate =
            CandidateMask::from_logits(logits_square(16, 5.0, 0, 0, 7, 7).view(), 0.92, &config).unwrap();
        let low_iou =
            CandidateMask::from_logits(logits_square(16, 5.0, 9, 9, 15, 15).view(), 0.50, &config).unwrap();
        let distinct =
            CandidateMask::from_logits(logits_square(16, 5.0, 10, 10, 15, 15).view(), 0.93, &config).unwrap();

        let kept = filter_candidates(vec![good, duplicate, low_iou, distinct], 1, &config);
        assert_eq!(kept.len(), 2);
        // Highest predicted IoU survives the duplicate pair
        assert_eq!(kept[0].pred_iou, 0.96);
    }

    #[test]
    fn test_assemble_labels_smaller_regions_on_top() {
        let config = MaskGenConfig {
            min_mask_region_area: 0,
            ..MaskGenConfig::default()
        };
        let large = CandidateMask::from_logits(logits_square(16, 5.0, 0, 0, 11, 11).view(), 0.95, &config).unwrap();
        let small = CandidateMask::from_logits(logits_square(16, 5.0, 2, 2, 5, 5).view(), 0.95, &config).unwrap();

        let labels = assemble_labels(vec![small.clone(), large.clone()], 16, 16);

        // Largest painted first as id 1, the smaller overwrote it as id 2
        assert_eq!(labels.get_pixel(0, 0)[0], 1);
        assert_eq!(labels.get_pixel(3, 3)[0], 2);
        assert_eq!(labels.get_pixel(15, 15)[0], 0);
    }

    #[test]
    fn test_upscale_preserves_label_values() {
        let config = MaskGenConfig {
            min_mask_region_area: 0,
            ..MaskGenConfig::default()
        };
        let region = CandidateMask::from_logits(logits_square(8, 5.0, 0, 0, 3, 3).view(), 0.95, &config).unwrap();
        let labels = assemble_labels(vec![region], 8, 8);

        let upscaled = upscale_labels(&labels, 32, 32);
        assert_eq!(upscaled.dimensions(), (32, 32));
        assert_eq!(upscaled.get_pixel(2, 2)[0], 1);
        let values: std::collections::BTreeSet<u16> = upscaled.pixels().map(|p| p[0]).collect();
        assert_eq!(values, [0u16, 1].into_iter().collect());
    }
}
