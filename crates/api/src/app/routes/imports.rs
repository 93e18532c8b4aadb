//! Import sessions: upload, review, resolve, edit, submit; plus the upload log.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
};

use remitflow_infra::RawImportFile;
use remitflow_reconcile::{RecordEdit, RecordId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const FILENAME_HEADER: &str = "x-filename";

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_import))
        .route("/log", get(import_log))
        .route("/:id", get(get_import).delete(abandon_import))
        .route("/:id/conflict", get(get_conflict))
        .route("/:id/resolutions", post(resolve))
        .route("/:id/records/:record_id", patch(edit_record))
        .route("/:id/submit", post(submit_import))
}

/// POST /imports?force=true
///
/// Body is the raw file; its name travels in the `x-filename` header.
pub async fn start_import(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ImportQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Some(filename) = headers
        .get(FILENAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_filename",
            format!("{FILENAME_HEADER} header is required"),
        );
    };

    let file = RawImportFile {
        filename: filename.to_string(),
        content: body.to_vec(),
    };
    match services.pipeline.start(&file, query.force) {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

/// GET /imports/log?offset=0&limit=20, newest first.
pub async fn import_log(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LogQuery>,
) -> axum::response::Response {
    match services.pipeline.import_log(query.offset, query.limit) {
        Ok(entries) => (StatusCode::OK, Json(dto::ImportLogResponse { entries })).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn get_import(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pipeline.snapshot(id) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

/// The active stage: the conflict awaiting decisions, or `ready`.
pub async fn get_conflict(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pipeline.stage(id) {
        Ok(stage) => (StatusCode::OK, Json(stage)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ResolutionRequest>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = match &body {
        dto::ResolutionRequest::Stage(stage) => services.pipeline.resolve_stage(id, stage),
        dto::ResolutionRequest::Group(g) => {
            services
                .pipeline
                .resolve(id, g.category, &g.group, &g.decision)
        }
    };
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            tracing::warn!(import_id = %id, error = %e, "resolution rejected");
            errors::pipeline_error_to_response(e)
        }
    }
}

pub async fn edit_record(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, record_id)): Path<(String, u32)>,
    Json(edit): Json<RecordEdit>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pipeline.edit_record(id, RecordId(record_id), &edit) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

/// POST /imports/:id/submit with an optional `{ "due_date": "YYYY-MM-DD" }`.
pub async fn submit_import(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::SubmitRequest>>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let due_date = body.and_then(|Json(b)| b.due_date);
    match services.pipeline.submit(id, due_date) {
        Ok(batch_id) => (StatusCode::CREATED, Json(dto::SubmitResponse { batch_id })).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn abandon_import(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_import_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pipeline.abandon(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
