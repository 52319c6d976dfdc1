//! The endpoint error boundary.
//!
//! Every failure crossing an endpoint becomes a JSON envelope
//! `{"status": "error", "message": ...}` with an HTTP error status; there is
//! no retry logic and no finer error taxonomy on the wire.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),

    #[error(transparent)]
    Segments(#[from] vectorize::VectorizeError),

    #[error(transparent)]
    Model(#[from] segmentation::SegmentationError),
}

/// The uniform error body served by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            // A missing segment file means no pipeline has produced one yet
            ApiError::Segments(vectorize::VectorizeError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        tracing::error!(%status, %message, "request failed");

        let envelope = ErrorEnvelope { status: "error", message };
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Segments(vectorize::VectorizeError::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Segments(vectorize::VectorizeError::GeometricComputation("x".into()))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
