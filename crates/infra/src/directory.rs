//! Provider directory collaborator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;

use remitflow_providers::{ProviderDirectoryEntry, ProviderId, ProviderPatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("provider directory unavailable: {0}")]
    Unavailable(String),

    #[error("patch for {0} changes nothing")]
    EmptyPatch(ProviderId),
}

/// Canonical provider master data.
///
/// `update` is an upsert: patching an unknown provider creates its entry.
pub trait ProviderDirectory: Send + Sync {
    fn get(&self, provider_id: &ProviderId) -> Result<Option<ProviderDirectoryEntry>, DirectoryError>;

    fn update(
        &self,
        provider_id: &ProviderId,
        patch: &ProviderPatch,
    ) -> Result<ProviderDirectoryEntry, DirectoryError>;

    fn list(&self) -> Result<Vec<ProviderDirectoryEntry>, DirectoryError>;
}

impl<D> ProviderDirectory for Arc<D>
where
    D: ProviderDirectory + ?Sized,
{
    fn get(&self, provider_id: &ProviderId) -> Result<Option<ProviderDirectoryEntry>, DirectoryError> {
        (**self).get(provider_id)
    }

    fn update(
        &self,
        provider_id: &ProviderId,
        patch: &ProviderPatch,
    ) -> Result<ProviderDirectoryEntry, DirectoryError> {
        (**self).update(provider_id, patch)
    }

    fn list(&self) -> Result<Vec<ProviderDirectoryEntry>, DirectoryError> {
        (**self).list()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProviderDirectory {
    inner: RwLock<HashMap<ProviderId, ProviderDirectoryEntry>>,
}

impl InMemoryProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

impl ProviderDirectory for InMemoryProviderDirectory {
    fn get(&self, provider_id: &ProviderId) -> Result<Option<ProviderDirectoryEntry>, DirectoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(provider_id).cloned())
    }

    fn update(
        &self,
        provider_id: &ProviderId,
        patch: &ProviderPatch,
    ) -> Result<ProviderDirectoryEntry, DirectoryError> {
        if patch.is_empty() {
            return Err(DirectoryError::EmptyPatch(provider_id.clone()));
        }
        let now = Utc::now();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let entry = map
            .entry(provider_id.clone())
            .or_insert_with(|| ProviderDirectoryEntry::new(provider_id.clone(), now));
        entry.apply(patch, now);
        Ok(entry.clone())
    }

    fn list(&self) -> Result<Vec<ProviderDirectoryEntry>, DirectoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut entries: Vec<_> = map.values().cloned().collect();
        entries.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        Ok(entries)
    }
}
