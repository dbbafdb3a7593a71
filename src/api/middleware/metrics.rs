use super::request_id::REQUEST_ID_HEADER;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(req).await;

    info!(
        target: "metrics",
        method = %method,
        uri = %uri,
        request_id = %request_id,
        status = %response.status().as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "request_completed"
    );

    response
}
