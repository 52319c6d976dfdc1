//! HTTP surface of the TerraBound pipeline.
//!
//! Three endpoints drive the system: `POST /minmax` runs the full
//! region -> imagery -> segmentation -> vectorization pipeline for a
//! bounding box, `GET /get-segments` serves the latest run's polygons as
//! geographic JSON, and `POST /calculate-areas` reports geodesic areas for
//! a requested id subset. Requests are stateless apart from the on-disk run
//! workspace.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, SharedState};
