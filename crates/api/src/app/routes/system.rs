use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::sse::Event as SseEvent};

use crate::app::dto;
use crate::app::services::{self, AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Directory writes given up so far, plus writer counters.
pub async fn notifications(
    Extension(services): Extension<Arc<AppServices>>,
) -> Json<dto::NotificationsResponse> {
    let writer = services.pipeline.writer();
    Json(dto::NotificationsResponse {
        stats: writer.stats(),
        failures: writer.failures(),
    })
}

pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::notifications_sse_stream(services)
}
