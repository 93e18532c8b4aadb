use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use remitflow_infra::BatchStore;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id", get(get_batch))
}

pub async fn get_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_batch_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.batches.get(id) {
        Ok(Some(batch)) => (StatusCode::OK, Json(batch)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("batch {id} not found")),
        Err(e) => errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "collaborator_unavailable",
            e.to_string(),
        ),
    }
}
