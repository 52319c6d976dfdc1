//! Offline driver for the segmentation pipeline.
//!
//! Mirrors the HTTP surface for local use: `run` executes the full pipeline
//! for a bounding box, `segments` prints the latest run's polygons, `areas`
//! reports geodesic areas for selected ids.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use imagery::{AcquireConfig, TileProvider};
use pipeline::{PipelineDeps, RunWorkspace};
use segmentation::{MaskGenConfig, ModelVariant, SamModel, ensure_weights};
use terrabound_common::LonLatBBox;
use vectorize::{SegmentCollection, VectorizeOptions};

#[derive(Parser, Debug)]
#[command(name = "terrabound", about = "Satellite land segmentation pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Root directory for pipeline runs
    #[arg(long, default_value = "workspace", global = true)]
    pub workspace: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline for a bounding box
    Run(RunArgs),
    /// Print the latest run's polygons as GeoJSON
    Segments,
    /// Print geodesic areas for the given segment ids
    Areas {
        /// Comma-separated segment ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u32>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub min_lat: f64,
    #[arg(long)]
    pub min_lon: f64,
    #[arg(long)]
    pub max_lat: f64,
    #[arg(long)]
    pub max_lon: f64,

    /// Tile provider (google_satellite, open_street_map, esri_world_imagery)
    #[arg(long, default_value = "google_satellite")]
    pub provider: String,

    /// Output raster width in pixels
    #[arg(long, default_value_t = 4096)]
    pub width: u32,

    /// Model checkpoint cache directory
    #[arg(long, default_value = "models")]
    pub models: PathBuf,
}

pub async fn execute(cli: Cli) -> color_eyre::Result<()> {
    let workspace = RunWorkspace::new(&cli.workspace)?;

    match cli.command {
        Command::Run(args) => run_pipeline(&workspace, args).await,
        Command::Segments => print_segments(&workspace),
        Command::Areas { ids } => print_areas(&workspace, &ids),
    }
}

async fn run_pipeline(workspace: &RunWorkspace, args: RunArgs) -> color_eyre::Result<()> {
    let bbox = LonLatBBox::new(args.min_lon, args.min_lat, args.max_lon, args.max_lat)?;
    let provider = TileProvider::from_str(&args.provider)
        .map_err(|_| color_eyre::eyre::eyre!("unknown tile provider {:?}", args.provider))?;

    let paths = ensure_weights(ModelVariant::default(), &args.models).await?;
    let model = SamModel::load(&paths, MaskGenConfig::default())?;
    let source = provider.source();

    let deps = PipelineDeps {
        model: &model,
        tile_source: &source,
        acquire: AcquireConfig { width: args.width, zoom_override: None },
        vectorize: VectorizeOptions::default(),
    };
    let report = pipeline::run(workspace, bbox, &deps).await?;

    println!("Run {} complete:", report.run_id);
    println!("  imagery:  {}", report.imagery_file.display());
    println!("  labels:   {}", report.labels_file.display());
    println!("  overlay:  {}", report.overlay_file.display());
    println!("  segments: {} ({} polygons)", report.segments_file.display(), report.polygon_count);
    Ok(())
}

fn latest_segments(workspace: &RunWorkspace) -> color_eyre::Result<SegmentCollection> {
    let report = workspace
        .latest()?
        .ok_or_else(|| color_eyre::eyre::eyre!("no pipeline run recorded yet"))?;
    Ok(SegmentCollection::load(&report.segments_file)?)
}

fn print_segments(workspace: &RunWorkspace) -> color_eyre::Result<()> {
    let segments = latest_segments(workspace)?;
    let collection = segments.to_feature_collection();
    println!("{}", serde_json::to_string_pretty(&collection)?);
    Ok(())
}

fn print_areas(workspace: &RunWorkspace, ids: &[u32]) -> color_eyre::Result<()> {
    let segments = latest_segments(workspace)?;
    for (id, area) in segments.areas_for(ids) {
        println!("{id}: {area:.1} m^2");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::parse_from([
            "terrabound", "run",
            "--min-lat", "10.0", "--min-lon", "20.0",
            "--max-lat", "10.1", "--max-lon", "20.1",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.min_lat, 10.0);
                assert_eq!(args.width, 4096);
                assert_eq!(args.provider, "google_satellite");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parses_area_ids() {
        let cli = Cli::parse_from(["terrabound", "areas", "--ids", "3,7,12"]);
        match cli.command {
            Command::Areas { ids } => assert_eq!(ids, vec![3, 7, 12]),
            _ => panic!("expected areas command"),
        }
    }
}
