//! Import pipeline: owns the open sessions and wires them to the collaborators.
//!
//! Every operation is synchronous on the in-memory record set. Directory
//! writes produced along the way are handed to the [`DirectoryWriter`] and
//! never waited on. Every upload attempt lands in the [`ImportLog`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use remitflow_core::{BatchId, ImportId};
use remitflow_events::EventBus;
use remitflow_providers::{DirectoryUpdate, DirectoryWriteFailed};
use remitflow_reconcile::{
    ConflictCategory, Decision, Fingerprint, GateError, GroupKey, ImportSession, InvoiceRecord,
    RecordEdit, RecordId, RecordStats, ResolutionError, Stage, StageResolution,
};

use crate::batch_store::{BatchStore, BatchStoreError};
use crate::directory_writer::{Dispatch, DirectoryWriter};
use crate::import_log::{ImportLog, ImportLogEntry, ImportLogError, ImportOutcome};
use crate::ingestion::{IngestError, IngestionService, RawImportFile};

const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("import {0} not found")]
    UnknownImport(ImportId),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    BatchStore(#[from] BatchStoreError),

    #[error(transparent)]
    ImportLog(#[from] ImportLogError),
}

/// Read view of one import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSnapshot {
    pub id: ImportId,
    pub source_name: String,
    pub fingerprint: Fingerprint,
    pub opened_at: DateTime<Utc>,
    pub stage: Stage,
    pub stats: RecordStats,
    pub submittable: bool,
    pub records: Vec<InvoiceRecord>,
}

impl ImportSnapshot {
    fn of(session: &ImportSession) -> Self {
        Self {
            id: session.id(),
            source_name: session.source_name().to_string(),
            fingerprint: session.fingerprint().clone(),
            opened_at: session.opened_at(),
            stage: session.stage().clone(),
            stats: session.records().stats(),
            submittable: session.is_submittable(),
            records: session.records().records().to_vec(),
        }
    }
}

struct OpenImport {
    session: ImportSession,
    touched: Instant,
}

impl OpenImport {
    fn new(session: ImportSession) -> Self {
        Self {
            session,
            touched: Instant::now(),
        }
    }
}

pub struct ImportPipeline<I, S, L, B>
where
    B: EventBus<DirectoryWriteFailed> + 'static,
{
    ingestion: I,
    batches: S,
    log: L,
    writer: DirectoryWriter<B>,
    sessions: Mutex<HashMap<ImportId, OpenImport>>,
    session_idle: Duration,
}

impl<I, S, L, B> ImportPipeline<I, S, L, B>
where
    I: IngestionService,
    S: BatchStore,
    L: ImportLog,
    B: EventBus<DirectoryWriteFailed> + 'static,
{
    pub fn new(ingestion: I, batches: S, log: L, writer: DirectoryWriter<B>) -> Self {
        Self {
            ingestion,
            batches,
            log,
            writer,
            sessions: Mutex::new(HashMap::new()),
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }

    /// Imports not touched for `idle` are dropped when the next one starts.
    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }

    pub fn writer(&self) -> &DirectoryWriter<B> {
        &self.writer
    }

    // Sessions are only replaced whole, so a panicked holder leaves them usable.
    fn sessions(&self) -> MutexGuard<'_, HashMap<ImportId, OpenImport>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            warn!("import sessions lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn with_session<T>(
        &self,
        id: ImportId,
        f: impl FnOnce(&mut ImportSession) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut sessions = self.sessions();
        let open = sessions.get_mut(&id).ok_or(PipelineError::UnknownImport(id))?;
        open.touched = Instant::now();
        f(&mut open.session)
    }

    fn dispatch(&self, import_id: ImportId, updates: impl IntoIterator<Item = DirectoryUpdate>) {
        for update in updates {
            let provider_id = update.provider_id.clone();
            if self.writer.dispatch(update) == Dispatch::Rejected {
                warn!(%import_id, %provider_id, "directory write rejected");
            }
        }
    }

    fn audit(&self, entry: ImportLogEntry) {
        if let Err(e) = self.log.record(entry) {
            warn!(error = %e, "import log entry lost");
        }
    }

    fn expire_idle(&self) {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, open| open.touched.elapsed() < self.session_idle);
        let expired = before - sessions.len();
        if expired > 0 {
            info!(expired, "idle imports dropped");
        }
    }

    /// Ingest a file and open a session for it. Refusals are logged too.
    pub fn start(&self, file: &RawImportFile, force: bool) -> Result<ImportSnapshot, PipelineError> {
        self.expire_idle();

        let imported = match self.ingestion.ingest(file, force) {
            Ok(imported) => imported,
            Err(e) => {
                self.audit(
                    ImportLogEntry::new(&file.filename, ImportOutcome::Error).with_details(e.to_string()),
                );
                return Err(e.into());
            }
        };
        let session = ImportSession::open(imported.fingerprint, file.filename.clone(), imported.records);
        let snapshot = ImportSnapshot::of(&session);

        let stats = snapshot.stats;
        let outcome = if stats.warning + stats.error > 0 {
            ImportOutcome::Warning
        } else {
            ImportOutcome::Success
        };
        self.audit(
            ImportLogEntry::new(&file.filename, outcome)
                .with_details(format!(
                    "{} valid, {} with warnings, {} with errors",
                    stats.valid, stats.warning, stats.error
                ))
                .with_total(snapshot.records.len()),
        );

        self.sessions().insert(session.id(), OpenImport::new(session));
        Ok(snapshot)
    }

    pub fn snapshot(&self, id: ImportId) -> Result<ImportSnapshot, PipelineError> {
        self.with_session(id, |s| Ok(ImportSnapshot::of(s)))
    }

    pub fn stage(&self, id: ImportId) -> Result<Stage, PipelineError> {
        self.with_session(id, |s| Ok(s.stage().clone()))
    }

    pub fn resolve(
        &self,
        id: ImportId,
        category: ConflictCategory,
        key: &GroupKey,
        decision: &Decision,
    ) -> Result<ImportSnapshot, PipelineError> {
        let (update, snapshot) = self.with_session(id, |s| {
            let update = s.resolve(category, key, decision)?;
            Ok((update, ImportSnapshot::of(s)))
        })?;
        self.dispatch(id, update);
        Ok(snapshot)
    }

    pub fn resolve_stage(
        &self,
        id: ImportId,
        resolution: &StageResolution,
    ) -> Result<ImportSnapshot, PipelineError> {
        let (updates, snapshot) = self.with_session(id, |s| {
            let updates = s.resolve_stage(resolution)?;
            Ok((updates, ImportSnapshot::of(s)))
        })?;
        self.dispatch(id, updates);
        Ok(snapshot)
    }

    pub fn edit_record(
        &self,
        id: ImportId,
        record_id: RecordId,
        edit: &RecordEdit,
    ) -> Result<ImportSnapshot, PipelineError> {
        let (update, snapshot) = self.with_session(id, |s| {
            let update = s.edit_record(record_id, edit)?;
            Ok((update, ImportSnapshot::of(s)))
        })?;
        self.dispatch(id, update);
        Ok(snapshot)
    }

    /// Hand the batch to the store and end the session.
    ///
    /// The session leaves the map for the duration, so a second submit of the
    /// same import sees it as unknown; a refusal puts it back.
    pub fn submit(&self, id: ImportId, due_date: Option<NaiveDate>) -> Result<BatchId, PipelineError> {
        let mut open = self.sessions().remove(&id).ok_or(PipelineError::UnknownImport(id))?;

        let created = open
            .session
            .batch_payload(due_date)
            .map_err(PipelineError::from)
            .and_then(|payload| {
                let records = payload.records.len();
                Ok((self.batches.create(payload)?, records))
            });
        match created {
            Ok((batch_id, records)) => {
                open.session.mark_submitted(batch_id);
                info!(import_id = %id, %batch_id, records, "batch created");
                Ok(batch_id)
            }
            Err(e) => {
                open.touched = Instant::now();
                self.sessions().insert(id, open);
                Err(e)
            }
        }
    }

    /// Discard an import and everything resolved in it.
    pub fn abandon(&self, id: ImportId) -> Result<(), PipelineError> {
        self.sessions()
            .remove(&id)
            .map(|_| info!(import_id = %id, "import abandoned"))
            .ok_or(PipelineError::UnknownImport(id))
    }

    /// Upload history, newest first.
    pub fn import_log(&self, offset: usize, limit: usize) -> Result<Vec<ImportLogEntry>, PipelineError> {
        Ok(self.log.list(offset, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_store::InMemoryBatchStore;
    use crate::directory::{InMemoryProviderDirectory, ProviderDirectory};
    use crate::directory_writer::DirectoryWriterConfig;
    use crate::import_log::InMemoryImportLog;
    use crate::ingestion::JsonRowsIngestion;
    use remitflow_events::InMemoryEventBus;
    use remitflow_providers::{EmailUpdate, ProviderId, ProviderPatch};
    use remitflow_reconcile::RecordStatus;
    use std::sync::Arc;

    type Bus = Arc<InMemoryEventBus<DirectoryWriteFailed>>;
    type Pipeline = ImportPipeline<
        JsonRowsIngestion<Arc<InMemoryProviderDirectory>, Arc<InMemoryBatchStore>>,
        Arc<InMemoryBatchStore>,
        Arc<InMemoryImportLog>,
        Bus,
    >;

    const FILE_IBAN: &str = "ES9121000418450200051332";
    const DIR_IBAN: &str = "ES5700811234560001234567";

    fn pipeline() -> (Pipeline, Arc<InMemoryProviderDirectory>, Arc<InMemoryBatchStore>) {
        let directory = Arc::new(InMemoryProviderDirectory::new());
        directory
            .update(
                &ProviderId::parse("B12345674").unwrap(),
                &ProviderPatch {
                    name: Some("Suministros Norte SL".to_string()),
                    email: Some(EmailUpdate::Replace("pagos@norte.es".to_string())),
                    address: Some("Calle Mayor 1".to_string()),
                    city: Some("Bilbao".to_string()),
                    postal_code: Some("48001".to_string()),
                    country: Some("ES".to_string()),
                    account: Some(DIR_IBAN.to_string()),
                    phone: None,
                },
            )
            .unwrap();
        let batches = Arc::new(InMemoryBatchStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let writer =
            DirectoryWriter::spawn(directory.clone(), bus, DirectoryWriterConfig::default()).unwrap();
        let ingestion = JsonRowsIngestion::new(directory.clone(), batches.clone());
        let log = Arc::new(InMemoryImportLog::new());
        (ImportPipeline::new(ingestion, batches.clone(), log, writer), directory, batches)
    }

    fn file(json: String) -> RawImportFile {
        RawImportFile {
            filename: "march.json".to_string(),
            content: json.into_bytes(),
        }
    }

    #[test]
    fn account_conflict_to_batch() {
        let (pipeline, directory, batches) = pipeline();
        let json = format!(r#"[{{"cif":"B12345674","amount":"99,95","iban":"{FILE_IBAN}"}}]"#);
        let raw = file(json);

        let opened = pipeline.start(&raw, false).unwrap();
        let Stage::AwaitingResolution(conflict) = &opened.stage else {
            panic!("expected an account conflict, got {:?}", opened.stage);
        };
        assert_eq!(conflict.category, ConflictCategory::AccountConflict);
        assert!(!opened.submittable);

        let snapshot = pipeline
            .resolve(
                opened.id,
                ConflictCategory::AccountConflict,
                &conflict.groups[0].key,
                &Decision::UseFileAccount,
            )
            .unwrap();
        assert_eq!(snapshot.stage, Stage::Ready);
        assert!(snapshot.submittable);
        assert_eq!(snapshot.records[0].status, RecordStatus::Valid);

        let due = NaiveDate::from_ymd_opt(2024, 4, 30);
        let batch_id = pipeline.submit(opened.id, due).unwrap();
        let stored = batches.get(batch_id).unwrap().unwrap();
        assert_eq!(stored.payload.total_amount_cents, 9_995);
        assert_eq!(stored.payload.records[0].due_date, due);
        assert!(matches!(
            pipeline.snapshot(opened.id),
            Err(PipelineError::UnknownImport(_))
        ));

        // same file again: refused, then forced
        assert!(matches!(
            pipeline.start(&raw, false),
            Err(PipelineError::Ingest(IngestError::DuplicateImport { .. }))
        ));
        assert!(pipeline.start(&raw, true).is_ok());

        assert_eq!(pipeline.writer().stats().queued, 1);
        assert!(pipeline.writer().failures().is_empty());
        drop(pipeline);
        let entry = directory
            .get(&ProviderId::parse("B12345674").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(entry.account.as_deref(), Some(FILE_IBAN));
    }

    #[test]
    fn premature_submit_is_refused() {
        let (pipeline, _, _) = pipeline();
        let json = format!(r#"[{{"cif":"B12345674","amount":5,"iban":"{FILE_IBAN}"}}]"#);
        let opened = pipeline.start(&file(json), false).unwrap();

        assert!(matches!(
            pipeline.submit(opened.id, None),
            Err(PipelineError::Gate(GateError::Unresolved(
                ConflictCategory::AccountConflict
            )))
        ));
        pipeline.abandon(opened.id).unwrap();
        assert!(matches!(
            pipeline.abandon(opened.id),
            Err(PipelineError::UnknownImport(_))
        ));
    }

    #[test]
    fn manual_edit_restarts_detection() {
        let (pipeline, _, _) = pipeline();
        let json = r#"[{"cif":"B99999999","amount":5,"iban":"ES9121000418450200051332"}]"#;
        let opened = pipeline.start(&file(json.to_string()), false).unwrap();
        assert!(matches!(opened.stage, Stage::AwaitingResolution(_)));

        let edit = RecordEdit {
            provider_name: Some("Talleres Sur SA".to_string()),
            contact_email: Some("admin@talleres.es".to_string()),
            address: Some("Av. Andalucia 12".to_string()),
            city: Some("Sevilla".to_string()),
            postal_code: Some("41001".to_string()),
            ..RecordEdit::default()
        };
        let snapshot = pipeline.edit_record(opened.id, RecordId(1), &edit).unwrap();
        assert_eq!(snapshot.stage, Stage::Ready);
        assert_eq!(snapshot.records[0].status, RecordStatus::Warning);
        assert!(snapshot.submittable);
    }

    #[test]
    fn overflowing_total_is_refused_and_the_import_stays_open() {
        let (pipeline, _, batches) = pipeline();
        let json = format!(
            r#"[{{"cif":"B12345674","amount":5,"iban":"{DIR_IBAN}"}},
                {{"cif":"B12345674","amount":7,"iban":"{DIR_IBAN}"}}]"#
        );
        let opened = pipeline.start(&file(json), false).unwrap();
        assert!(opened.submittable);

        let edit = RecordEdit {
            amount_cents: Some(u64::MAX),
            ..RecordEdit::default()
        };
        let edited = pipeline.edit_record(opened.id, RecordId(1), &edit).unwrap();
        assert!(!edited.submittable);
        assert_eq!(edited.stats.total_amount_cents, u64::MAX);

        assert!(matches!(
            pipeline.submit(opened.id, None),
            Err(PipelineError::Gate(GateError::AmountOverflow))
        ));
        assert!(pipeline.snapshot(opened.id).is_ok());

        // still serving
        let edit = RecordEdit {
            amount_cents: Some(500),
            ..RecordEdit::default()
        };
        pipeline.edit_record(opened.id, RecordId(1), &edit).unwrap();
        let batch_id = pipeline.submit(opened.id, None).unwrap();
        assert_eq!(batches.get(batch_id).unwrap().unwrap().payload.total_amount_cents, 1_200);
        let json = r#"[{"cif":"B12345674","amount":1}]"#;
        assert!(pipeline.start(&file(json.to_string()), false).is_ok());
    }

    #[test]
    fn every_upload_attempt_is_logged() {
        let (pipeline, _, _) = pipeline();
        let good = format!(r#"[{{"cif":"B12345674","amount":5,"iban":"{DIR_IBAN}"}}]"#);
        let opened = pipeline.start(&file(good.clone()), false).unwrap();
        pipeline.submit(opened.id, None).unwrap();

        let warned = r#"[{"cif":"B99999999","amount":5},{"amount":3}]"#;
        pipeline.start(&file(warned.to_string()), false).unwrap();
        assert!(pipeline.start(&file(good), false).is_err());
        let huge = r#"[{"cif":"B12345674","amount":1e300}]"#;
        assert!(pipeline.start(&file(huge.to_string()), false).is_err());
        let sheet = RawImportFile {
            filename: "march.xlsx".to_string(),
            content: Vec::new(),
        };
        assert!(pipeline.start(&sheet, false).is_err());

        let log = pipeline.import_log(0, 10).unwrap();
        let outcomes: Vec<ImportOutcome> = log.iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            [
                ImportOutcome::Error,
                ImportOutcome::Error,
                ImportOutcome::Error,
                ImportOutcome::Warning,
                ImportOutcome::Success,
            ]
        );
        assert_eq!(log[0].filename, "march.xlsx");
        assert_eq!(log[1].details.as_deref(), Some("malformed file: row 1: amount out of range"));
        assert!(log[2].details.as_deref().is_some_and(|d| d.starts_with("file was already imported")));
        assert_eq!(log[3].total_invoices, 2);
        assert_eq!(log[4].total_invoices, 1);
        assert_eq!(pipeline.import_log(4, 10).unwrap().len(), 1);
    }

    #[test]
    fn idle_imports_are_dropped_on_the_next_start() {
        let (pipeline, _, _) = pipeline();
        let pipeline = pipeline.with_session_idle(Duration::ZERO);
        let json = r#"[{"cif":"B12345674","amount":5}]"#;

        let first = pipeline.start(&file(json.to_string()), false).unwrap();
        let second = pipeline.start(&file(json.to_string()), false).unwrap();
        assert!(matches!(
            pipeline.snapshot(first.id),
            Err(PipelineError::UnknownImport(_))
        ));
        assert!(pipeline.snapshot(second.id).is_ok());
    }
}
