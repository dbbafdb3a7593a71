use crate::AppState;
use crate::api::error::{AppError, LICENSE_NOT_FOUND_MESSAGE, too_large_message};
use crate::models::{UploadRequest, ValidationOutcome};
use crate::utils::validation::{IntakeError, validate_declared};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::BytesMut;
use serde::Serialize;
use utoipa::ToSchema;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "License uploaded successfully.";

#[derive(Serialize, ToSchema)]
pub struct LicenseUploadResponse {
    pub message: String,
    /// Location of the retained raster image
    pub path: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Multipart form accepted by the upload endpoint
#[derive(ToSchema)]
pub struct LicenseUploadForm {
    /// JPEG, PNG or PDF, at most 5 MB
    #[schema(format = Binary)]
    pub license: String,
}

fn multipart_error(e: MultipartError, max_size: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(too_large_message(max_size))
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[utoipa::path(
    post,
    path = "/license/upload",
    request_body(content = LicenseUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "License number found, image retained", body = LicenseUploadResponse),
        (status = 400, description = "Rejected upload or no license number found", body = MessageResponse),
        (status = 500, description = "Staging, conversion or OCR failure", body = MessageResponse)
    ),
    tag = "license"
)]
pub async fn upload_license(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<LicenseUploadResponse>, AppError> {
    let max_size = state.config.max_file_size;
    let mut upload = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if field.name() != Some(state.config.upload_field.as_str()) {
            continue;
        }

        let original_filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|s| s.to_string());

        // 1. Reject on declared metadata before reading the body
        validate_declared(&original_filename, content_type.as_deref())?;

        // 2. Buffer in memory, stopping as soon as the ceiling is crossed
        let mut buffer = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_size))?
        {
            let size = buffer.len() + chunk.len();
            if size > max_size {
                return Err(IntakeError::TooLarge {
                    size,
                    max: max_size,
                }
                .into());
            }
            buffer.extend_from_slice(&chunk);
        }

        upload = Some(UploadRequest::new(
            original_filename,
            content_type,
            buffer.freeze(),
        ));
        break;
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("No file uploaded.".to_string()))?;

    // 3. Run detached so a client disconnect cannot interrupt cleanup
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.run(upload).await })
        .await
        .map_err(|e| AppError::Internal(format!("License pipeline task failed: {}", e)))??;

    match outcome {
        ValidationOutcome::Matched {
            retained_artifact_path,
            ..
        } => Ok(Json(LicenseUploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            path: retained_artifact_path.display().to_string(),
        })),
        ValidationOutcome::NotMatched { .. } => {
            Err(AppError::BadRequest(LICENSE_NOT_FOUND_MESSAGE.to_string()))
        }
    }
}
