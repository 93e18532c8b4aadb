//! Import audit log: one entry per upload attempt, refused ones included.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportOutcome {
    Success,
    /// Opened, but some records need attention.
    Warning,
    /// Refused: duplicate, unsupported or unreadable file.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub at: DateTime<Utc>,
    pub filename: String,
    pub outcome: ImportOutcome,
    pub details: Option<String>,
    pub total_invoices: usize,
}

impl ImportLogEntry {
    pub fn new(filename: impl Into<String>, outcome: ImportOutcome) -> Self {
        Self {
            at: Utc::now(),
            filename: filename.into(),
            outcome,
            details: None,
            total_invoices: 0,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_total(mut self, total_invoices: usize) -> Self {
        self.total_invoices = total_invoices;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportLogError {
    #[error("import log unavailable: {0}")]
    Unavailable(String),
}

pub trait ImportLog: Send + Sync {
    fn record(&self, entry: ImportLogEntry) -> Result<(), ImportLogError>;

    /// Newest first, skipping `offset` entries and returning at most `limit`.
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ImportLogEntry>, ImportLogError>;
}

impl<L> ImportLog for Arc<L>
where
    L: ImportLog + ?Sized,
{
    fn record(&self, entry: ImportLogEntry) -> Result<(), ImportLogError> {
        (**self).record(entry)
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ImportLogEntry>, ImportLogError> {
        (**self).list(offset, limit)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryImportLog {
    entries: RwLock<Vec<ImportLogEntry>>,
}

impl InMemoryImportLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ImportLogError {
    ImportLogError::Unavailable("lock poisoned".to_string())
}

impl ImportLog for InMemoryImportLog {
    fn record(&self, entry: ImportLogEntry) -> Result<(), ImportLogError> {
        self.entries.write().map_err(|_| poisoned())?.push(entry);
        Ok(())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ImportLogEntry>, ImportLogError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.iter().rev().skip(offset).take(limit).cloned().collect())
    }
}
