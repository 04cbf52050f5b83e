use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadInput(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Image pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            // Caller mistakes in pipeline parameters are client errors;
            // decode and worker failures are ours.
            AppError::Pipeline(PipelineError::InvalidParam(_))
            | AppError::Pipeline(PipelineError::Degenerate) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_param_errors_are_bad_requests() {
        let err = AppError::Pipeline(PipelineError::InvalidParam("zoom".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let err = AppError::Pipeline(PipelineError::Degenerate);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let err = AppError::Pipeline(PipelineError::Decode("bad".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::BadInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
