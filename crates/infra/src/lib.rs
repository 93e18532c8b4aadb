//! Infrastructure layer: collaborators, the directory writer, the import log,
//! config, and the pipeline that ties an import session to them.

pub mod batch_store;
pub mod config;
pub mod directory;
pub mod directory_writer;
pub mod import_log;
pub mod ingestion;
pub mod pipeline;
pub mod retry;

pub use batch_store::{BatchStore, BatchStoreError, InMemoryBatchStore, StoredBatch};
pub use config::{ConfigError, ConfigFallback, PipelineConfig};
pub use directory::{DirectoryError, InMemoryProviderDirectory, ProviderDirectory};
pub use directory_writer::{Dispatch, DirectoryWriter, DirectoryWriterConfig, WriterStats};
pub use import_log::{ImportLog, ImportLogEntry, ImportLogError, ImportOutcome, InMemoryImportLog};
pub use ingestion::{
    IngestError, IngestedImport, IngestionService, JsonRowsIngestion, RawImportFile, fingerprint,
};
pub use pipeline::{ImportPipeline, ImportSnapshot, PipelineError};
pub use retry::{Backoff, RetryPolicy};
