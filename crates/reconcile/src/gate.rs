//! Submission gate and batch payload assembly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conflict::{ConflictCategory, Detection};
use crate::detect::detect_next_conflict;
use crate::record::{InvoiceRecord, RecordId, RecordSet};

/// Content-derived identifier of an ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("unresolved conflicts remain: {0}")]
    Unresolved(ConflictCategory),

    #[error("{} record(s) have blocking errors", .0.len())]
    BlockingRecords(Vec<RecordId>),

    #[error("there are no records to submit")]
    EmptyBatch,

    #[error("import was already submitted")]
    SessionClosed,

    #[error("batch total exceeds the representable amount")]
    AmountOverflow,
}

/// What the batch store receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub name: String,
    pub records: Vec<InvoiceRecord>,
    pub fingerprint: Fingerprint,
    pub due_date: Option<NaiveDate>,
    pub total_amount_cents: u64,
    pub created_at: DateTime<Utc>,
}

/// No conflict left, no record in ERROR, and something to submit.
pub fn is_submittable(records: &RecordSet) -> bool {
    check(records).is_ok()
}

fn check(records: &RecordSet) -> Result<(), GateError> {
    if let Detection::Conflict(conflict) = detect_next_conflict(records) {
        return Err(GateError::Unresolved(conflict.category));
    }
    if records.is_empty() {
        return Err(GateError::EmptyBatch);
    }
    let blocking = records.blocking_records();
    if !blocking.is_empty() {
        return Err(GateError::BlockingRecords(blocking));
    }
    total_cents(records.iter())?;
    Ok(())
}

fn total_cents<'a>(mut records: impl Iterator<Item = &'a InvoiceRecord>) -> Result<u64, GateError> {
    records.try_fold(0u64, |acc, r| {
        acc.checked_add(r.amount_cents).ok_or(GateError::AmountOverflow)
    })
}

/// Assemble the batch. A given due date replaces every record's own.
pub fn build_batch_payload(
    records: &RecordSet,
    fingerprint: &Fingerprint,
    due_date: Option<NaiveDate>,
) -> Result<BatchPayload, GateError> {
    check(records)?;
    let total_amount_cents = total_cents(records.iter())?;

    let created_at = Utc::now();
    let records: Vec<InvoiceRecord> = records
        .iter()
        .cloned()
        .map(|mut r| {
            if due_date.is_some() {
                r.due_date = due_date;
            }
            r
        })
        .collect();

    Ok(BatchPayload {
        name: format!("Remittance {}", created_at.format("%Y-%m-%d %H:%M")),
        total_amount_cents,
        records,
        fingerprint: fingerprint.clone(),
        due_date,
        created_at,
    })
}
