use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub staging: String,
    pub renderer: String,
    pub ocr: String,
    pub version: String,
}

fn readiness(ok: bool) -> String {
    if ok { "ready" } else { "unavailable" }.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    let (staging, renderer, ocr) = tokio::join!(
        pipeline.staging().is_ready(),
        pipeline.renderer().health_check(),
        pipeline.extractor().health_check(),
    );

    Json(HealthResponse {
        status: "ok".to_string(),
        staging: readiness(staging),
        renderer: readiness(renderer),
        ocr: readiness(ocr),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
