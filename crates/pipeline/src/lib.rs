//! Sequential orchestration of the four pipeline stages.
//!
//! Every request gets its own working directory under `<root>/runs/<id>`, so
//! concurrent runs never share artifact paths; a `latest.json` marker at the
//! workspace root names the most recent successful run for the serving read
//! paths. Stages execute strictly in order with no queuing and no retries.

use std::path::{Path, PathBuf};

use imagery::{AcquireConfig, TileSource};
use region::{RegionRecord, RegionStore};
use segmentation::SamModel;
use serde::{Deserialize, Serialize};
use terrabound_common::LonLatBBox;
use thiserror::Error;
use vectorize::VectorizeOptions;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Region step failed: {0}")]
    Region(#[from] region::RegionError),

    #[error("Imagery step failed: {0}")]
    Imagery(#[from] imagery::ImageryError),

    #[error("Segmentation step failed: {0}")]
    Segmentation(#[from] segmentation::SegmentationError),

    #[error("Vectorization step failed: {0}")]
    Vectorize(#[from] vectorize::VectorizeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout for pipeline runs
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    root: PathBuf,
}

impl RunWorkspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("runs"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh working directory for one pipeline run
    pub fn begin_run(&self) -> Result<PipelineContext> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let dir = self.root.join("runs").join(&run_id);
        std::fs::create_dir_all(&dir)?;
        Ok(PipelineContext { run_id, dir })
    }

    fn latest_marker(&self) -> PathBuf {
        self.root.join("latest.json")
    }

    /// Mark a run as the most recent successful one
    pub fn record_latest(&self, report: &RunReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(self.latest_marker(), json)?;
        Ok(())
    }

    /// The most recent successful run, if any pipeline has completed yet
    pub fn latest(&self) -> Result<Option<RunReport>> {
        let marker = self.latest_marker();
        if !marker.exists() {
            return Ok(None);
        }
        let report = serde_json::from_str(&std::fs::read_to_string(marker)?)?;
        Ok(Some(report))
    }
}

/// Typed artifact paths for one run, passed between stages instead of
/// shared fixed file names.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: String,
    pub dir: PathBuf,
}

impl PipelineContext {
    pub fn imagery_path(&self) -> PathBuf {
        self.dir.join("satellite.tif")
    }

    pub fn segments_path(&self) -> PathBuf {
        self.dir.join("segments.geojson")
    }
}

/// Everything a run needs beyond the request itself. The model handle is
/// owned by the caller and injected here.
pub struct PipelineDeps<'a> {
    pub model: &'a SamModel,
    pub tile_source: &'a TileSource,
    pub acquire: AcquireConfig,
    pub vectorize: VectorizeOptions,
}

/// Summary of a completed run; persisted as the `latest.json` marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub region_file: PathBuf,
    pub imagery_file: PathBuf,
    pub labels_file: PathBuf,
    pub overlay_file: PathBuf,
    pub segments_file: PathBuf,
    pub polygon_count: usize,
}

/// Execute region -> imagery -> segmentation -> vectorization for one
/// bounding box. On success the run becomes the workspace's latest.
pub async fn run(
    workspace: &RunWorkspace,
    bbox: LonLatBBox,
    deps: &PipelineDeps<'_>,
) -> Result<RunReport> {
    let ctx = workspace.begin_run()?;
    tracing::info!(run_id = %ctx.run_id, ?bbox, "pipeline run started");

    // 1. Region definition
    let record = RegionRecord::from_bbox("region", bbox)?;
    let store = RegionStore::new(&ctx.dir)?;
    let region_file = store.save(&record)?;

    // 2. Imagery acquisition
    let raster = imagery::acquire(
        &record.bounds,
        deps.tile_source,
        &deps.acquire,
        &ctx.imagery_path(),
    )
    .await?;

    // 3. Segmentation
    let output = segmentation::segment_raster(deps.model, &raster)?;
    let artifacts = output.write(&ctx.dir)?;

    // 4. Vectorization
    let segments = vectorize::vectorize(&output.label_raster, &deps.vectorize)?;
    let segments_file = ctx.segments_path();
    segments.save(&segments_file)?;

    let report = RunReport {
        run_id: ctx.run_id.clone(),
        region_file,
        imagery_file: raster.image_path,
        labels_file: artifacts.labels,
        overlay_file: artifacts.overlay,
        segments_file,
        polygon_count: segments.len(),
    };
    workspace.record_latest(&report)?;

    tracing::info!(run_id = %ctx.run_id, polygons = report.polygon_count, "pipeline run complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_run_gets_its_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::new(dir.path()).unwrap();

        let a = workspace.begin_run().unwrap();
        let b = workspace.begin_run().unwrap();

        assert_ne!(a.run_id, b.run_id);
        assert_ne!(a.dir, b.dir);
        assert!(a.dir.is_dir() && b.dir.is_dir());
    }

    #[test]
    fn test_latest_absent_before_any_run() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::new(dir.path()).unwrap();
        assert!(workspace.latest().unwrap().is_none());
    }

    #[test]
    fn test_latest_marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::new(dir.path()).unwrap();
        let ctx = workspace.begin_run().unwrap();

        let report = RunReport {
            run_id: ctx.run_id.clone(),
            region_file: ctx.dir.join("region.geojson"),
            imagery_file: ctx.imagery_path(),
            labels_file: ctx.dir.join("labels.png"),
            overlay_file: ctx.dir.join("overlay.png"),
            segments_file: ctx.segments_path(),
            polygon_count: 12,
        };
        workspace.record_latest(&report).unwrap();

        assert_eq!(workspace.latest().unwrap(), Some(report));
    }

    #[test]
    fn test_context_paths_live_inside_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::new(dir.path()).unwrap();
        let ctx = workspace.begin_run().unwrap();

        assert!(ctx.imagery_path().starts_with(&ctx.dir));
        assert!(ctx.segments_path().starts_with(&ctx.dir));
    }
}
