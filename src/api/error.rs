use crate::services::pipeline::PipelineError;
use crate::utils::validation::IntakeError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const UNSUPPORTED_FORMAT_MESSAGE: &str =
    "Invalid file type. Only JPEG, JPG, PNG and PDF files are allowed.";
pub const LICENSE_NOT_FOUND_MESSAGE: &str =
    "Invalid Document: A valid license number (starting with HN or CN) could not be found.";

pub fn too_large_message(max: usize) -> String {
    format!("File too large. Maximum allowed size is {} MB.", max / 1024 / 1024)
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<IntakeError> for AppError {
    fn from(e: IntakeError) -> Self {
        tracing::info!("Upload rejected ({}): {}", e.reason(), e);
        match e {
            IntakeError::UnsupportedFormat(_) => {
                AppError::BadRequest(UNSUPPORTED_FORMAT_MESSAGE.to_string())
            }
            IntakeError::TooLarge { max, .. } => AppError::BadRequest(too_large_message(max)),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Rejected(intake) => intake.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}
