use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use remitflow_core::{BatchId, ImportId};
use remitflow_infra::{ImportLogEntry, WriterStats};
use remitflow_providers::{DirectoryWriteFailed, ProviderId};
use remitflow_reconcile::{ConflictCategory, Decision, GroupKey, StageResolution};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportQuery {
    /// Import a file even when a batch with the same fingerprint exists.
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct GroupResolutionRequest {
    pub category: ConflictCategory,
    pub group: GroupKey,
    pub decision: Decision,
}

/// Either one group at a time, or every group of the stage at once.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResolutionRequest {
    Stage(StageResolution),
    Group(GroupResolutionRequest),
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub due_date: Option<NaiveDate>,
}

/// `?offset=&limit=` on the import log.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub offset: usize,
    pub limit: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self { offset: 0, limit: 20 }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub batch_id: BatchId,
}

#[derive(Debug, Serialize)]
pub struct ImportLogResponse {
    pub entries: Vec<ImportLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub stats: WriterStats,
    pub failures: Vec<DirectoryWriteFailed>,
}

// -------------------------
// Path parsing
// -------------------------

pub fn parse_import_id(raw: &str) -> Result<ImportId, axum::response::Response> {
    raw.parse::<ImportId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_batch_id(raw: &str) -> Result<BatchId, axum::response::Response> {
    raw.parse::<BatchId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_provider_id(raw: &str) -> Result<ProviderId, axum::response::Response> {
    ProviderId::parse(raw)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
