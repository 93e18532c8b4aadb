//! Conflict categories, grouping keys and the detection result.

use serde::{Deserialize, Serialize};

use remitflow_providers::{PaymentAccount, ProviderId};

use crate::decision::MandatoryValues;
use crate::record::{InvoiceRecord, MandatoryField, RecordId};

/// The three defect classes, in the order they are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    AmbiguousContact,
    AccountConflict,
    MissingDirectoryFields,
}

impl ConflictCategory {
    pub const PRIORITY: [ConflictCategory; 3] = [
        ConflictCategory::AmbiguousContact,
        ConflictCategory::AccountConflict,
        ConflictCategory::MissingDirectoryFields,
    ];

    /// Whether the record itself exhibits this defect.
    pub fn affects(self, record: &InvoiceRecord) -> bool {
        match self {
            ConflictCategory::AmbiguousContact => record.has_ambiguous_contact(),
            ConflictCategory::AccountConflict => record.iban_mismatch,
            ConflictCategory::MissingDirectoryFields => {
                record.provider_id.is_some() && !record.missing_fields().is_empty()
            }
        }
    }

    /// Grouping key of a record under this category.
    ///
    /// For missing fields every record of a provider gets the provider key,
    /// affected or not, so a resolution reaches all of the provider's records.
    pub fn classify(self, record: &InvoiceRecord) -> Option<GroupKey> {
        match self {
            ConflictCategory::AmbiguousContact => self
                .affects(record)
                .then_some(GroupKey::Record { record_id: record.id }),
            ConflictCategory::AccountConflict => {
                self.affects(record).then(|| GroupKey::ProviderAccount {
                    provider_id: record.provider_id.clone(),
                    account: record.payment_account.as_deref().and_then(PaymentAccount::parse),
                })
            }
            ConflictCategory::MissingDirectoryFields => record
                .provider_id
                .clone()
                .map(|provider_id| GroupKey::Provider { provider_id }),
        }
    }
}

impl core::fmt::Display for ConflictCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ConflictCategory::AmbiguousContact => "ambiguous contact",
            ConflictCategory::AccountConflict => "payment account conflict",
            ConflictCategory::MissingDirectoryFields => "missing directory fields",
        })
    }
}

/// Resolution key of a group. Its shape depends on the category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    Record {
        record_id: RecordId,
    },
    ProviderAccount {
        provider_id: Option<ProviderId>,
        account: Option<PaymentAccount>,
    },
    Provider {
        provider_id: ProviderId,
    },
}

impl core::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GroupKey::Record { record_id } => write!(f, "record {record_id}"),
            GroupKey::ProviderAccount {
                provider_id,
                account,
            } => write!(
                f,
                "provider {} / account {}",
                provider_id.as_ref().map_or("-", |p| p.as_str()),
                account.as_ref().map_or("-", |a| a.as_str()),
            ),
            GroupKey::Provider { provider_id } => write!(f, "provider {provider_id}"),
        }
    }
}

/// What the operator is shown for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum GroupDetail {
    AmbiguousContact {
        provider_id: Option<ProviderId>,
        provider_name: Option<String>,
        addresses: Vec<String>,
    },
    AccountConflict {
        provider_id: Option<ProviderId>,
        provider_name: Option<String>,
        file_account: Option<String>,
        directory_account: Option<String>,
    },
    MissingDirectoryFields {
        provider_id: Option<ProviderId>,
        /// Fields absent on at least one record of the group.
        missing: Vec<MandatoryField>,
        /// Always the full set; the operator confirms every field.
        required: Vec<MandatoryField>,
        /// First non-blank value of each field across the group.
        defaults: MandatoryValues,
    },
}

impl GroupDetail {
    pub(crate) fn describe(
        category: ConflictCategory,
        representative: &InvoiceRecord,
        members: &[&InvoiceRecord],
    ) -> Self {
        match category {
            ConflictCategory::AmbiguousContact => GroupDetail::AmbiguousContact {
                provider_id: representative.provider_id.clone(),
                provider_name: representative.provider_name.clone(),
                addresses: representative.contact_addresses(),
            },
            ConflictCategory::AccountConflict => GroupDetail::AccountConflict {
                provider_id: representative.provider_id.clone(),
                provider_name: representative.provider_name.clone(),
                file_account: representative.payment_account.clone(),
                directory_account: representative.directory_account_snapshot.clone(),
            },
            ConflictCategory::MissingDirectoryFields => {
                let missing = MandatoryField::ALL
                    .into_iter()
                    .filter(|f| members.iter().any(|r| r.field(*f).is_none()))
                    .collect();
                GroupDetail::MissingDirectoryFields {
                    provider_id: representative.provider_id.clone(),
                    missing,
                    required: MandatoryField::ALL.to_vec(),
                    defaults: MandatoryValues::first_known(members),
                }
            }
        }
    }
}

/// One decision unit: records that receive an identical resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictGroup {
    pub key: GroupKey,
    pub record_ids: Vec<RecordId>,
    pub representative: RecordId,
    pub detail: GroupDetail,
}

/// The active category and all of its groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub category: ConflictCategory,
    pub groups: Vec<ConflictGroup>,
}

impl Conflict {
    pub fn group(&self, key: &GroupKey) -> Option<&ConflictGroup> {
        self.groups.iter().find(|g| &g.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Detection {
    Conflict(Conflict),
    Ready,
}

impl Detection {
    pub fn is_ready(&self) -> bool {
        matches!(self, Detection::Ready)
    }
}
