//! Per-record validation: recomputes `status` and `validation_message`.

use serde::{Deserialize, Serialize};

use remitflow_providers::PaymentAccount;

use crate::record::{InvoiceRecord, RecordStatus};

/// One validation observation about a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    MissingTaxId,
    SuspiciousTaxId,
    ZeroAmount,
    MissingAccount,
    InvalidAccount,
}

impl Finding {
    pub fn severity(self) -> RecordStatus {
        match self {
            Finding::MissingTaxId | Finding::InvalidAccount => RecordStatus::Error,
            Finding::SuspiciousTaxId | Finding::ZeroAmount | Finding::MissingAccount => {
                RecordStatus::Warning
            }
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Finding::MissingTaxId => "missing tax identifier",
            Finding::SuspiciousTaxId => "suspicious tax identifier",
            Finding::ZeroAmount => "zero amount",
            Finding::MissingAccount => "missing payment account",
            Finding::InvalidAccount => "invalid payment account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub status: RecordStatus,
    pub findings: Vec<Finding>,
}

impl Assessment {
    pub fn message(&self) -> String {
        self.findings
            .iter()
            .map(|f| f.message())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn assess(record: &InvoiceRecord) -> Assessment {
    let mut findings = Vec::new();

    match &record.provider_id {
        None => findings.push(Finding::MissingTaxId),
        Some(id) if !id.is_checksum_valid() => findings.push(Finding::SuspiciousTaxId),
        Some(_) => {}
    }

    if record.amount_cents == 0 {
        findings.push(Finding::ZeroAmount);
    }

    match record.payment_account.as_deref().and_then(PaymentAccount::parse) {
        None => findings.push(Finding::MissingAccount),
        Some(account) if !account.is_valid_iban() => findings.push(Finding::InvalidAccount),
        Some(_) => {}
    }

    let status = findings
        .iter()
        .map(|f| f.severity())
        .max()
        .unwrap_or(RecordStatus::Valid);

    Assessment { status, findings }
}

/// Recompute status and message in place. `note` is prepended to the message.
pub fn refresh(record: &mut InvoiceRecord, note: Option<&str>) {
    let assessment = assess(record);
    let findings = assessment.message();
    record.status = assessment.status;
    record.validation_message = match (note, findings.is_empty()) {
        (Some(note), true) => note.to_string(),
        (Some(note), false) => format!("{note}: {findings}"),
        (None, _) => findings,
    };
}
