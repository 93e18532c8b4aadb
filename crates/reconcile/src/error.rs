use thiserror::Error;

use remitflow_core::DomainError;

use crate::conflict::{ConflictCategory, GroupKey};
use crate::record::{MandatoryField, RecordId};

/// Why a decision cannot be committed yet. The stage stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncompleteReason {
    #[error("no decision given")]
    NoDecision,
    #[error("select one of the listed addresses or enter a new one")]
    NoSelection,
    #[error("'{0}' is not one of the listed addresses")]
    NotAListedAddress(String),
    #[error("'{0}' is not a valid e-mail address")]
    InvalidNewAddress(String),
    #[error("the directory holds no account for this provider")]
    NoDirectoryAccount,
    #[error("the file holds no account for this group")]
    NoFileAccount,
    #[error("account is too short ({len} characters, at least {min} required)")]
    AccountTooShort { len: usize, min: usize },
    #[error("{0} is required")]
    MissingField(MandatoryField),
    #[error("decision does not apply to this conflict")]
    DecisionKindMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("there is no conflict to resolve")]
    NothingToResolve,

    #[error("active stage is {expected}, not {got}")]
    CategoryMismatch {
        expected: ConflictCategory,
        got: ConflictCategory,
    },

    #[error("no open group {0}")]
    UnknownGroup(GroupKey),

    #[error("{group}: {reason}")]
    Incomplete {
        group: GroupKey,
        reason: IncompleteReason,
    },

    #[error("more than one decision for {0}")]
    DuplicateDecision(GroupKey),

    #[error("unknown record {0}")]
    UnknownRecord(RecordId),

    #[error(transparent)]
    InvalidEdit(#[from] DomainError),

    #[error("import was already submitted")]
    SessionClosed,
}

impl ResolutionError {
    pub fn incomplete(group: &GroupKey, reason: IncompleteReason) -> Self {
        Self::Incomplete {
            group: group.clone(),
            reason,
        }
    }
}
