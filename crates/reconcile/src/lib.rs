//! Import conflict-resolution pipeline.
//!
//! Given the records of one ingested remittance file, this crate finds the
//! first outstanding class of defect (ambiguous contact, payment-account
//! conflict, missing directory fields), groups the affected records into
//! decision units, merges operator decisions back into every record of a
//! group, and decides when the record set may become a batch.
//!
//! Everything here is deterministic domain logic: no IO, no threads. Side
//! effects leave the crate as [`DirectoryUpdate`] intents, which the caller
//! dispatches however it likes.
//!
//! [`DirectoryUpdate`]: remitflow_providers::DirectoryUpdate

pub mod commit;
pub mod conflict;
pub mod decision;
pub mod detect;
pub mod error;
pub mod gate;
pub mod group;
pub mod record;
pub mod sequencer;
pub mod session;
pub mod validation;

pub use commit::{MIN_CUSTOM_ACCOUNT_LEN, PreparedResolution, prepare};
pub use conflict::{Conflict, ConflictCategory, ConflictGroup, Detection, GroupDetail, GroupKey};
pub use decision::{Decision, GroupDecision, MandatoryValues, StageResolution};
pub use detect::detect_next_conflict;
pub use error::{IncompleteReason, ResolutionError};
pub use gate::{BatchPayload, Fingerprint, GateError, build_batch_payload, is_submittable};
pub use group::group_records;
pub use record::{InvoiceRecord, MandatoryField, RecordId, RecordSet, RecordStats, RecordStatus};
pub use sequencer::{Stage, StageSequencer};
pub use session::{ImportSession, RecordEdit};
pub use validation::{Assessment, Finding, assess};
