//! HTTP endpoints and their wire types.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use geojson::FeatureCollection;
use imagery::AcquireConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use terrabound_common::LonLatBBox;
use tower_http::cors::CorsLayer;
use ts_rs::TS;
use vectorize::{SegmentCollection, VectorizeOptions};

use crate::{error::ApiError, state::SharedState};

/// Bounding box request: `min`/`max` are `[lat, lon]` pairs as emitted by
/// the map widget.
#[derive(Debug, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct MinMaxRequest {
    #[schemars(description = "South-west corner as [lat, lon]")]
    pub min: [f64; 2],
    #[schemars(description = "North-east corner as [lat, lon]")]
    pub max: [f64; 2],
}

#[derive(Debug, Serialize, JsonSchema, TS)]
#[ts(export)]
pub struct PipelineResponse {
    pub status: &'static str,
    /// Path of the persisted polygon file; legacy field name kept so
    /// existing clients keep working
    pub shapefile: String,
    pub imagery: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SegmentsResponse {
    pub status: &'static str,
    pub data: FeatureCollection,
}

#[derive(Debug, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct AreasRequest {
    #[serde(rename = "selectedIds")]
    #[schemars(description = "Segment ids to compute areas for")]
    pub selected_ids: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, JsonSchema, TS)]
#[ts(export)]
pub struct AreasResponse {
    pub status: &'static str,
    /// Segment id -> geodesic area in m^2; unknown ids report 0
    pub areas: BTreeMap<String, f64>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/minmax", post(minmax))
        .route("/get-segments", get(get_segments))
        .route("/calculate-areas", post(calculate_areas))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "TerraBound segmentation service"
}

/// Run the full region -> imagery -> segmentation -> vectorization pipeline
/// for the requested bounding box.
async fn minmax(
    State(state): State<SharedState>,
    Json(request): Json<MinMaxRequest>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let bbox = LonLatBBox::new(
        request.min[1],
        request.min[0],
        request.max[1],
        request.max[0],
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(?bbox, "received bounding box request");

    let model = state.model().await?;
    let deps = pipeline::PipelineDeps {
        model,
        tile_source: &state.tile_source,
        acquire: AcquireConfig {
            width: state.config.image_width,
            zoom_override: None,
        },
        vectorize: VectorizeOptions::default(),
    };

    // One pipeline run at a time; each run still writes its own directory
    let _guard = state.run_lock.lock().await;
    let report = pipeline::run(&state.workspace, bbox, &deps).await?;

    Ok(Json(PipelineResponse {
        status: "success",
        shapefile: report.segments_file.display().to_string(),
        imagery: report.imagery_file.display().to_string(),
        message: "Workflow completed successfully".to_string(),
    }))
}

/// All polygons of the most recent run as geographic JSON
async fn get_segments(
    State(state): State<SharedState>,
) -> Result<Json<SegmentsResponse>, ApiError> {
    let segments = latest_segments(&state)?;
    Ok(Json(SegmentsResponse {
        status: "success",
        data: segments.to_feature_collection(),
    }))
}

/// Areas for a requested id subset; ids without a polygon report zero
async fn calculate_areas(
    State(state): State<SharedState>,
    Json(request): Json<AreasRequest>,
) -> Result<Json<AreasResponse>, ApiError> {
    let segments = latest_segments(&state)?;

    let ids: Vec<u32> = request
        .selected_ids
        .iter()
        .filter_map(parse_segment_id)
        .collect();

    let known = segments.ids();
    for id in &ids {
        if !known.contains(id) {
            tracing::warn!(id, "area requested for unknown segment id, reporting 0");
        }
    }

    let areas = segments
        .areas_for(&ids)
        .into_iter()
        .map(|(id, area)| (id.to_string(), area))
        .collect();

    Ok(Json(AreasResponse { status: "success", areas }))
}

fn latest_segments(state: &SharedState) -> Result<SegmentCollection, ApiError> {
    let report = state
        .workspace
        .latest()?
        .ok_or_else(|| ApiError::NotFound("No pipeline run recorded yet".to_string()))?;
    Ok(SegmentCollection::load(&report.segments_file)?)
}

/// Clients send ids as JSON numbers or strings; anything else is ignored
fn parse_segment_id(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
