// HTTP response utilities for JSON errors
use crate::domain::error::SeekerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Rejected input; nothing was applied.
    Invalid(SeekerError),
    /// The seeker task is gone or did not answer.
    Unavailable(anyhow::Error),
}

impl From<SeekerError> for ApiError {
    fn from(err: SeekerError) -> Self {
        ApiError::Invalid(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Unavailable(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Invalid(err) => {
                tracing::warn!("Rejected request: {}", err);
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ApiError::Unavailable(err) => {
                tracing::error!("Seeker unavailable: {:#}", err);
                (StatusCode::SERVICE_UNAVAILABLE, format!("{err:#}"))
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
