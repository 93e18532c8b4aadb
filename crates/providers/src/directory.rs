//! Directory write intents and their failure notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use remitflow_events::Event;

use crate::provider::{ProviderId, ProviderPatch};

/// What produced a directory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrigin {
    ContactResolution,
    AccountResolution,
    MandatoryFieldsResolution,
    ManualEdit,
}

/// Intent: correct the directory entry of one provider.
///
/// Emitted by a resolution commit; executed later and independently. The
/// pipeline never waits for, nor depends on, the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUpdate {
    pub provider_id: ProviderId,
    pub patch: ProviderPatch,
    pub origin: UpdateOrigin,
    pub requested_at: DateTime<Utc>,
}

impl DirectoryUpdate {
    pub fn new(provider_id: ProviderId, patch: ProviderPatch, origin: UpdateOrigin) -> Self {
        Self {
            provider_id,
            patch,
            origin,
            requested_at: Utc::now(),
        }
    }
}

/// Notification: a directory write was given up on.
///
/// Reported to the operator as an isolated notice; the resolved conflict that
/// produced the write stays resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryWriteFailed {
    pub update: DirectoryUpdate,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl Event for DirectoryWriteFailed {
    fn event_type(&self) -> &'static str {
        "providers.directory.write_failed"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.failed_at
    }
}
