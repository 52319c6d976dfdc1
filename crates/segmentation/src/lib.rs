//! # Segmentation - Pretrained Land Segmentation
//!
//! The third pipeline stage: runs a SAM-style pretrained segmentation model
//! over a georeferenced satellite raster and produces
//!
//! - a **label raster** (one integer region id per cell, 0 = background)
//!   with the same grid dimensions and transform as the source imagery,
//! - a **color overlay** raster for human inspection.
//!
//! Generation parameters are fixed constants ([`MaskGenConfig`]); they are
//! not exposed at the request boundary.
//!
//! ## Example
//!
//! ```rust,no_run
//! use segmentation::{MaskGenConfig, ModelVariant, SamModel, ensure_weights, segment_raster};
//! use terrabound_common::GeoRaster;
//!
//! # async fn run() -> segmentation::Result<()> {
//! let paths = ensure_weights(ModelVariant::MobileSam, "models".as_ref()).await?;
//! let model = SamModel::load(&paths, MaskGenConfig::default())?;
//!
//! let raster = GeoRaster::open("runs/demo/satellite.tif")?;
//! let output = segment_raster(&model, &raster)?;
//! output.write("runs/demo".as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod overlay;
pub mod preprocess;
pub mod session;
pub mod weights;

use std::path::{Path, PathBuf};

use image::RgbImage;
use terrabound_common::{GeoRaster, LabelRaster};
use thiserror::Error;

pub use generator::MaskGenConfig;
pub use session::SamModel;
pub use weights::{CheckpointPaths, ModelVariant, ensure_weights};

pub type Result<T> = std::result::Result<T, SegmentationError>;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Checkpoint file not found: {0}")]
    MissingWeights(PathBuf),

    #[error("Failed to download checkpoint from {url}: {source}")]
    WeightsDownload {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Inference error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Geo(#[from] terrabound_common::CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything one segmentation run produces
pub struct SegmentationOutput {
    pub label_raster: LabelRaster,
    pub overlay: RgbImage,
    pub region_count: usize,
}

/// Paths of the persisted artifacts
#[derive(Debug, Clone)]
pub struct SegmentationArtifacts {
    pub labels: PathBuf,
    pub overlay: PathBuf,
}

impl SegmentationOutput {
    /// Write the label raster and overlay into `dir`. Unlike the imagery
    /// stage there is no staging: artifacts of a failed run stay in place
    /// for inspection.
    pub fn write(&self, dir: &Path) -> Result<SegmentationArtifacts> {
        std::fs::create_dir_all(dir)?;
        let labels = dir.join("labels.png");
        let overlay = dir.join("overlay.png");

        self.label_raster.save(&labels)?;
        self.overlay.save(&overlay)?;

        tracing::info!(
            labels = %labels.display(),
            overlay = %overlay.display(),
            regions = self.region_count,
            "segmentation artifacts saved"
        );
        Ok(SegmentationArtifacts { labels, overlay })
    }
}

/// Segment a satellite raster with an automatic grid of point prompts.
///
/// Encodes the image once, decodes `points_per_side^2` prompts, keeps the
/// best mask per prompt, filters by predicted IoU / stability / minimum
/// area, suppresses duplicates by box NMS, and paints the survivors into a
/// label raster at the source grid size.
pub fn segment_raster(model: &SamModel, raster: &GeoRaster) -> Result<SegmentationOutput> {
    let config = *model.config();
    let pixels = raster.load_pixels()?;
    let prepared = preprocess::PreparedImage::from_rgb(&pixels);

    tracing::info!(
        source = %raster.image_path.display(),
        prompts = config.points_per_side * config.points_per_side,
        "running segmentation"
    );

    let embeddings = model.encode(&prepared.tensor)?;

    let points = generator::grid_points(
        config.points_per_side,
        prepared.scaled_width,
        prepared.scaled_height,
    );
    let mut candidates = Vec::new();
    for point in points {
        let (logits, pred_iou) =
            model.decode_point(&embeddings, point, prepared.scaled_width, prepared.scaled_height)?;
        if let Some(candidate) = generator::CandidateMask::from_logits(logits.view(), pred_iou, &config) {
            candidates.push(candidate);
        }
    }
    let proposed = candidates.len();

    // The minimum-area constant is defined in source-resolution pixels;
    // rescale it to the model grid the candidates live on.
    let model_px = f64::from(prepared.scaled_width) * f64::from(prepared.scaled_height);
    let source_px = f64::from(prepared.source_width) * f64::from(prepared.source_height);
    let min_area_model = (f64::from(config.min_mask_region_area) * model_px / source_px).ceil() as usize;

    let kept = generator::filter_candidates(candidates, min_area_model.max(1), &config);
    tracing::info!(proposed, kept = kept.len(), "mask proposals filtered");

    let region_count = kept.len();
    let labels_model = generator::assemble_labels(kept, prepared.scaled_width, prepared.scaled_height);
    let labels_full = generator::upscale_labels(&labels_model, raster.width, raster.height);
    let overlay = overlay::render_overlay(&pixels, &labels_full);

    Ok(SegmentationOutput {
        label_raster: LabelRaster::new(labels_full, raster.crs, raster.transform)?,
        overlay,
        region_count,
    })
}
