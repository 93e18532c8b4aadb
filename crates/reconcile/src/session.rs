//! One import from ingestion to submission.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use remitflow_core::{BatchId, ImportId};
use remitflow_providers::{DirectoryUpdate, ProviderId, ProviderPatch, UpdateOrigin, same_account};

use crate::conflict::{ConflictCategory, GroupKey};
use crate::decision::{Decision, StageResolution};
use crate::error::ResolutionError;
use crate::gate::{self, BatchPayload, Fingerprint, GateError};
use crate::record::{RecordId, RecordSet};
use crate::sequencer::{Stage, StageSequencer};
use crate::validation::refresh;

const MANUAL_EDIT_NOTE: &str = "corrected manually";

/// Field edits made on a single record outside the staged resolution.
/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordEdit {
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub payment_account: Option<String>,
    pub amount_cents: Option<u64>,
    pub invoice_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub contact_email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportSession {
    id: ImportId,
    fingerprint: Fingerprint,
    source_name: String,
    records: RecordSet,
    sequencer: StageSequencer,
    opened_at: DateTime<Utc>,
    submitted: Option<BatchId>,
}

impl ImportSession {
    /// Start a session and run the first detection pass.
    pub fn open(fingerprint: Fingerprint, source_name: impl Into<String>, records: RecordSet) -> Self {
        let mut sequencer = StageSequencer::new();
        sequencer.advance(&records);
        let session = Self {
            id: ImportId::new(),
            fingerprint,
            source_name: source_name.into(),
            records,
            sequencer,
            opened_at: Utc::now(),
            submitted: None,
        };
        info!(import_id = %session.id, records = session.records.len(), "import opened");
        session
    }

    pub fn id(&self) -> ImportId {
        self.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn stage(&self) -> &Stage {
        self.sequencer.stage()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn submitted_batch(&self) -> Option<BatchId> {
        self.submitted
    }

    pub fn resolve(
        &mut self,
        category: ConflictCategory,
        key: &GroupKey,
        decision: &Decision,
    ) -> Result<Option<DirectoryUpdate>, ResolutionError> {
        self.ensure_open()?;
        self.sequencer
            .resolve_group(&mut self.records, category, key, decision)
    }

    pub fn resolve_stage(
        &mut self,
        resolution: &StageResolution,
    ) -> Result<Vec<DirectoryUpdate>, ResolutionError> {
        self.ensure_open()?;
        self.sequencer.resolve_stage(&mut self.records, resolution)
    }

    /// Apply a manual edit to one record and restart detection.
    ///
    /// An account edit clears the mismatch flag. A changed name or account is
    /// sent to the directory when the record has a provider.
    pub fn edit_record(
        &mut self,
        id: RecordId,
        edit: &RecordEdit,
    ) -> Result<Option<DirectoryUpdate>, ResolutionError> {
        self.ensure_open()?;
        let provider_id = edit
            .provider_id
            .as_deref()
            .map(ProviderId::parse)
            .transpose()?;

        let mut next = self.records.clone();
        let record = next.get_mut(id).ok_or(ResolutionError::UnknownRecord(id))?;

        let name_changed = edit
            .provider_name
            .as_deref()
            .map(str::trim)
            .is_some_and(|v| record.provider_name.as_deref() != Some(v));
        let account_changed = edit.payment_account.as_deref().is_some_and(|v| {
            record
                .payment_account
                .as_deref()
                .is_none_or(|old| !same_account(v, old))
        });

        let assign = |slot: &mut Option<String>, value: &Option<String>| {
            if let Some(v) = value {
                *slot = Some(v.trim().to_string());
            }
        };
        if provider_id.is_some() {
            record.provider_id = provider_id;
        }
        assign(&mut record.provider_name, &edit.provider_name);
        assign(&mut record.payment_account, &edit.payment_account);
        assign(&mut record.invoice_number, &edit.invoice_number);
        assign(&mut record.contact_email, &edit.contact_email);
        assign(&mut record.address, &edit.address);
        assign(&mut record.city, &edit.city);
        assign(&mut record.postal_code, &edit.postal_code);
        assign(&mut record.country, &edit.country);
        assign(&mut record.phone, &edit.phone);
        if let Some(amount) = edit.amount_cents {
            record.amount_cents = amount;
        }
        if edit.due_date.is_some() {
            record.due_date = edit.due_date;
        }
        if account_changed {
            record.iban_mismatch = false;
        }
        refresh(record, Some(MANUAL_EDIT_NOTE));

        let update = match (&record.provider_id, name_changed || account_changed) {
            (Some(provider_id), true) => Some(DirectoryUpdate::new(
                provider_id.clone(),
                ProviderPatch {
                    name: record.provider_name.clone(),
                    account: record.payment_account.clone(),
                    ..ProviderPatch::default()
                },
                UpdateOrigin::ManualEdit,
            )),
            _ => None,
        };

        info!(import_id = %self.id, record = %id, "record edited");
        self.records = next;
        self.sequencer.advance(&self.records);
        Ok(update)
    }

    pub fn is_submittable(&self) -> bool {
        self.submitted.is_none() && self.sequencer.is_ready() && gate::is_submittable(&self.records)
    }

    pub fn batch_payload(&self, due_date: Option<NaiveDate>) -> Result<BatchPayload, GateError> {
        if self.submitted.is_some() {
            return Err(GateError::SessionClosed);
        }
        gate::build_batch_payload(&self.records, &self.fingerprint, due_date)
    }

    /// Close the session once the batch store has accepted the payload.
    pub fn mark_submitted(&mut self, batch_id: BatchId) {
        info!(import_id = %self.id, %batch_id, "import submitted");
        self.submitted = Some(batch_id);
    }

    fn ensure_open(&self) -> Result<(), ResolutionError> {
        match self.submitted {
            Some(_) => Err(ResolutionError::SessionClosed),
            None => Ok(()),
        }
    }
}
