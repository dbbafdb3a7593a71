pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::IntakeConfig;
use crate::services::pipeline::LicensePipeline;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Multipart framing allowance on top of the document ceiling
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::license::upload_license,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::license::LicenseUploadForm,
            api::handlers::license::LicenseUploadResponse,
            api::handlers::license::MessageResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "license", description = "License document intake"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LicensePipeline>,
    pub config: IntakeConfig,
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/license/upload",
            post(api::handlers::license::upload_license),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + MULTIPART_OVERHEAD,
        ))
        .with_state(state)
}
