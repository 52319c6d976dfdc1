use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorizeError {
    #[error("Segment file not found: {0}")]
    NotFound(PathBuf),

    #[error("Geometric computation error: {0}")]
    GeometricComputation(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Geo(#[from] terrabound_common::CommonError),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VectorizeError>;
