use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use remitflow_infra::{DirectoryError, IngestError, PipelineError};
use remitflow_reconcile::{GateError, ResolutionError};

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match &err {
        PipelineError::UnknownImport(_) => (StatusCode::NOT_FOUND, "not_found"),
        PipelineError::Ingest(e) => match e {
            IngestError::DuplicateImport { .. } => (StatusCode::CONFLICT, "duplicate_import"),
            IngestError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
            }
            IngestError::Malformed(_) => (StatusCode::BAD_REQUEST, "malformed_file"),
            IngestError::Directory(_) | IngestError::BatchStore(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable")
            }
        },
        PipelineError::Resolution(e) => match e {
            ResolutionError::NothingToResolve => (StatusCode::CONFLICT, "nothing_to_resolve"),
            ResolutionError::CategoryMismatch { .. } => (StatusCode::CONFLICT, "category_mismatch"),
            ResolutionError::UnknownGroup(_) => (StatusCode::NOT_FOUND, "unknown_group"),
            ResolutionError::Incomplete { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "incomplete_resolution")
            }
            ResolutionError::DuplicateDecision(_) => (StatusCode::BAD_REQUEST, "duplicate_decision"),
            ResolutionError::UnknownRecord(_) => (StatusCode::NOT_FOUND, "unknown_record"),
            ResolutionError::InvalidEdit(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ResolutionError::SessionClosed => (StatusCode::CONFLICT, "session_closed"),
        },
        PipelineError::Gate(e) => match e {
            GateError::Unresolved(_) => (StatusCode::CONFLICT, "unresolved_conflicts"),
            GateError::BlockingRecords(_) => (StatusCode::UNPROCESSABLE_ENTITY, "blocking_records"),
            GateError::EmptyBatch => (StatusCode::UNPROCESSABLE_ENTITY, "empty_batch"),
            GateError::SessionClosed => (StatusCode::CONFLICT, "session_closed"),
            GateError::AmountOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "amount_overflow"),
        },
        PipelineError::BatchStore(_) | PipelineError::ImportLog(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable")
        }
    };
    json_error(status, code, message)
}

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    match err {
        DirectoryError::EmptyPatch(_) => {
            json_error(StatusCode::BAD_REQUEST, "empty_patch", err.to_string())
        }
        DirectoryError::Unavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "collaborator_unavailable",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
