//! Ingestion service: raw file in, annotated records plus fingerprint out.
//!
//! [`JsonRowsIngestion`] reads a JSON array of rows. Each row is enriched from
//! the provider directory, annotated with the directory account snapshot and
//! the mismatch flag, and validated before the conflict pipeline sees it.

use chrono::NaiveDate;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use remitflow_core::BatchId;
use remitflow_providers::{ProviderDirectoryEntry, ProviderId, account};
use remitflow_reconcile::validation::refresh;
use remitflow_reconcile::{Fingerprint, InvoiceRecord, RecordId, RecordSet};

use crate::batch_store::{BatchStore, BatchStoreError};
use crate::directory::{DirectoryError, ProviderDirectory};

const DEFAULT_COUNTRY: &str = "ES";
const PLACEHOLDER_EMAILS: [&str; 3] = ["TEST@TEST.COM", "EMAIL@EMAIL.COM", "EXAMPLE@EXAMPLE.COM"];
/// File accounts this short (once normalised) are treated as noise, not as a
/// conflicting value.
const MIN_COMPARABLE_ACCOUNT_LEN: usize = 6;
/// Largest amount, in cents, that survives the float parse exactly (2^53).
const MAX_AMOUNT_CENTS: u64 = 1 << 53;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImportFile {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedImport {
    pub records: RecordSet,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file was already imported as batch {batch_id}; resubmit with force to import it again")]
    DuplicateImport {
        fingerprint: Fingerprint,
        batch_id: BatchId,
    },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed file: {0}")]
    Malformed(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    BatchStore(#[from] BatchStoreError),
}

pub trait IngestionService: Send + Sync {
    /// Parse and annotate a file. A file seen before is refused unless `force`.
    fn ingest(&self, file: &RawImportFile, force: bool) -> Result<IngestedImport, IngestError>;
}

pub fn fingerprint(content: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(content);
    Fingerprint::new(format!("{:x}", hasher.finalize()))
}

/// A row as written in the file. Header aliases follow the usual export names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Row {
    #[serde(alias = "factura", alias = "invoice")]
    invoice_number: Option<String>,
    #[serde(alias = "importe", alias = "total")]
    amount: Option<RawAmount>,
    #[serde(alias = "fecha_vencimiento", alias = "payment_date")]
    due_date: Option<String>,
    #[serde(alias = "cif", alias = "nif")]
    tax_id: Option<String>,
    #[serde(alias = "nombre", alias = "proveedor")]
    name: Option<String>,
    #[serde(alias = "iban", alias = "cuenta")]
    account: Option<String>,
    #[serde(alias = "correo")]
    email: Option<String>,
    #[serde(alias = "direccion")]
    address: Option<String>,
    #[serde(alias = "poblacion")]
    city: Option<String>,
    #[serde(alias = "cp", alias = "zip")]
    postal_code: Option<String>,
    #[serde(alias = "pais")]
    country: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Amount in cents. Unreadable or negative amounts become zero and are
    /// flagged by validation; `None` when the amount is too large to carry.
    fn cents(&self) -> Option<u64> {
        let value = match self {
            RawAmount::Number(n) => *n,
            RawAmount::Text(t) => {
                let t = t.trim();
                // "1.234,56" (decimal comma) vs "1234.56"
                let normalized = if t.contains(',') {
                    t.replace('.', "").replace(',', ".")
                } else {
                    t.to_string()
                };
                normalized.parse::<f64>().unwrap_or(0.0)
            }
        };
        if !value.is_finite() || value <= 0.0 {
            return Some(0);
        }
        let cents = (value * 100.0).round();
        (cents <= MAX_AMOUNT_CENTS as f64).then_some(cents as u64)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn normalize_country(raw: String) -> String {
    match raw.to_uppercase().as_str() {
        "ESPAÑA" | "ESPANA" | "SPAIN" | "ESP" => DEFAULT_COUNTRY.to_string(),
        _ => raw,
    }
}

/// JSON-rows ingestion backed by the provider directory and batch store.
pub struct JsonRowsIngestion<D, B> {
    directory: D,
    batches: B,
}

impl<D: ProviderDirectory, B: BatchStore> JsonRowsIngestion<D, B> {
    pub fn new(directory: D, batches: B) -> Self {
        Self { directory, batches }
    }

    fn build_record(&self, id: RecordId, row: Row) -> Result<InvoiceRecord, IngestError> {
        let mut record = InvoiceRecord::new(id);
        record.provider_id = clean(row.tax_id).and_then(|t| ProviderId::parse(&t).ok());
        record.provider_name = clean(row.name);
        record.payment_account = clean(row.account);
        record.amount_cents = match &row.amount {
            Some(amount) => amount.cents().ok_or_else(|| {
                IngestError::Malformed(format!("row {}: amount out of range", id.0))
            })?,
            None => 0,
        };
        record.invoice_number = clean(row.invoice_number);
        record.due_date = clean(row.due_date).as_deref().and_then(parse_date);
        record.contact_email = clean(row.email).filter(|e| {
            !PLACEHOLDER_EMAILS.contains(&e.to_uppercase().as_str())
        });
        record.address = clean(row.address);
        record.city = clean(row.city);
        record.postal_code = clean(row.postal_code);
        record.country = clean(row.country).map(normalize_country);
        record.phone = clean(row.phone);

        let mut note = None;
        if let Some(provider_id) = record.provider_id.clone() {
            if let Some(entry) = self.directory.get(&provider_id)? {
                note = enrich(&mut record, &entry);
            }
        }
        if record.country.is_none() {
            record.country = Some(DEFAULT_COUNTRY.to_string());
        }

        refresh(&mut record, note.as_deref());
        Ok(record)
    }
}

/// Fill blanks from the directory and compare accounts. Returns a note when
/// the account itself was taken from the directory.
fn enrich(record: &mut InvoiceRecord, entry: &ProviderDirectoryEntry) -> Option<String> {
    let fill = |slot: &mut Option<String>, value: &Option<String>| {
        if slot.is_none() {
            *slot = value.clone().filter(|v| !v.trim().is_empty());
        }
    };
    fill(&mut record.provider_name, &entry.name);
    fill(&mut record.contact_email, &entry.email);
    fill(&mut record.address, &entry.address);
    fill(&mut record.city, &entry.city);
    fill(&mut record.postal_code, &entry.postal_code);
    fill(&mut record.phone, &entry.phone);
    // an explicit non-default country in the file wins over the directory
    if record.country.as_deref().is_none_or(|c| c == DEFAULT_COUNTRY) {
        if let Some(country) = entry.country.clone().filter(|c| !c.trim().is_empty()) {
            record.country = Some(country);
        }
    }

    let directory_account = entry.account.clone().filter(|a| !a.trim().is_empty());
    record.directory_account_snapshot = directory_account.clone();
    match (&record.payment_account, directory_account) {
        (Some(file), Some(dir))
            if account::normalize(file).len() >= MIN_COMPARABLE_ACCOUNT_LEN =>
        {
            record.iban_mismatch = !account::same_account(file, &dir);
            None
        }
        (None, Some(dir)) => {
            record.payment_account = Some(dir);
            Some("auto-completed payment account".to_string())
        }
        _ => None,
    }
}

impl<D: ProviderDirectory, B: BatchStore> IngestionService for JsonRowsIngestion<D, B> {
    fn ingest(&self, file: &RawImportFile, force: bool) -> Result<IngestedImport, IngestError> {
        if !file.filename.to_lowercase().ends_with(".json") {
            return Err(IngestError::UnsupportedFormat(file.filename.clone()));
        }

        let fingerprint = fingerprint(&file.content);
        if let Some(batch_id) = self.batches.find_by_fingerprint(&fingerprint)? {
            if !force {
                warn!(file = %file.filename, %fingerprint, %batch_id, "duplicate import refused");
                return Err(IngestError::DuplicateImport {
                    fingerprint,
                    batch_id,
                });
            }
            info!(file = %file.filename, %batch_id, "duplicate import forced");
        }

        let rows: Vec<Row> = serde_json::from_slice(&file.content)
            .map_err(|e| IngestError::Malformed(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            let id = u32::try_from(i + 1)
                .map_err(|_| IngestError::Malformed("too many rows".to_string()))?;
            records.push(self.build_record(RecordId(id), row)?);
        }
        let records = RecordSet::new(records).map_err(|e| IngestError::Malformed(e.to_string()))?;

        debug!(file = %file.filename, records = records.len(), "file ingested");
        Ok(IngestedImport {
            records,
            fingerprint,
        })
    }
}
