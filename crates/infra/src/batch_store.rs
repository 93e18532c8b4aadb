//! Batch store collaborator: persists finalized remittance batches.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use remitflow_core::BatchId;
use remitflow_reconcile::{BatchPayload, Fingerprint};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchStoreError {
    #[error("batch store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    pub id: BatchId,
    #[serde(flatten)]
    pub payload: BatchPayload,
}

pub trait BatchStore: Send + Sync {
    fn create(&self, payload: BatchPayload) -> Result<BatchId, BatchStoreError>;

    fn get(&self, id: BatchId) -> Result<Option<StoredBatch>, BatchStoreError>;

    /// Oldest batch built from a file with this fingerprint.
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<BatchId>, BatchStoreError>;
}

impl<S> BatchStore for Arc<S>
where
    S: BatchStore + ?Sized,
{
    fn create(&self, payload: BatchPayload) -> Result<BatchId, BatchStoreError> {
        (**self).create(payload)
    }

    fn get(&self, id: BatchId) -> Result<Option<StoredBatch>, BatchStoreError> {
        (**self).get(id)
    }

    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<BatchId>, BatchStoreError> {
        (**self).find_by_fingerprint(fingerprint)
    }
}

/// Insertion-ordered in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    inner: RwLock<Vec<StoredBatch>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> BatchStoreError {
    BatchStoreError::Unavailable("lock poisoned".to_string())
}

impl BatchStore for InMemoryBatchStore {
    fn create(&self, payload: BatchPayload) -> Result<BatchId, BatchStoreError> {
        let id = BatchId::new();
        let mut batches = self.inner.write().map_err(|_| poisoned())?;
        batches.push(StoredBatch { id, payload });
        Ok(id)
    }

    fn get(&self, id: BatchId) -> Result<Option<StoredBatch>, BatchStoreError> {
        let batches = self.inner.read().map_err(|_| poisoned())?;
        Ok(batches.iter().find(|b| b.id == id).cloned())
    }

    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<BatchId>, BatchStoreError> {
        let batches = self.inner.read().map_err(|_| poisoned())?;
        Ok(batches
            .iter()
            .find(|b| &b.payload.fingerprint == fingerprint)
            .map(|b| b.id))
    }
}
