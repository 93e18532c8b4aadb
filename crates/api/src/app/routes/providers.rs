//! Provider directory: read an entry, or upsert one by hand.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use remitflow_infra::ProviderDirectory;
use remitflow_providers::ProviderPatch;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_providers))
        .route("/:tax_id", get(get_provider).put(put_provider))
}

pub async fn list_providers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.directory.list() {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn get_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tax_id): Path<String>,
) -> axum::response::Response {
    let provider_id = match dto::parse_provider_id(&tax_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.directory.get(&provider_id) {
        Ok(Some(entry)) => (StatusCode::OK, Json(entry)).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("provider {provider_id} not found"),
        ),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// Upsert: an unknown tax id creates the entry.
pub async fn put_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tax_id): Path<String>,
    Json(patch): Json<ProviderPatch>,
) -> axum::response::Response {
    let provider_id = match dto::parse_provider_id(&tax_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.directory.update(&provider_id, &patch) {
        Ok(entry) => {
            tracing::info!(%provider_id, "provider entry updated by hand");
            (StatusCode::OK, Json(entry)).into_response()
        }
        Err(e) => errors::directory_error_to_response(e),
    }
}
