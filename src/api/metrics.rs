//! Prometheus text exposition endpoint.

use axum::http::header;
use axum::response::IntoResponse;

use crate::services::metrics;

pub async fn handle_metrics() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::render(),
    )
}
