//! Resolution committer: merges one group decision into its records.
//!
//! Committing is two-phase. [`prepare`] checks the decision against the
//! current records and fails without touching anything; the returned
//! [`PreparedResolution`] then applies infallibly, writing the same value
//! onto every record of the group and yielding the directory write, if any.

use remitflow_providers::{
    DirectoryUpdate, EmailUpdate, PaymentAccount, ProviderId, ProviderPatch, UpdateOrigin,
    is_plausible_email, same_account,
};

use crate::conflict::{Conflict, GroupKey};
use crate::decision::{Decision, MandatoryValues};
use crate::error::{IncompleteReason, ResolutionError};
use crate::record::{MandatoryField, RecordId, RecordSet};
use crate::validation::refresh;

/// Shortest accepted custom account, counted after normalisation.
pub const MIN_CUSTOM_ACCOUNT_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Contact { address: String, is_new: bool },
    Account { value: String, write: bool },
    Fields(MandatoryValues),
}

/// A validated decision, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedResolution {
    key: GroupKey,
    record_ids: Vec<RecordId>,
    provider_id: Option<ProviderId>,
    change: Change,
}

pub fn prepare(
    records: &RecordSet,
    conflict: &Conflict,
    key: &GroupKey,
    decision: &Decision,
) -> Result<PreparedResolution, ResolutionError> {
    if decision.category() != conflict.category {
        return Err(ResolutionError::CategoryMismatch {
            expected: conflict.category,
            got: decision.category(),
        });
    }
    let group = conflict
        .group(key)
        .ok_or_else(|| ResolutionError::UnknownGroup(key.clone()))?;
    let representative = records
        .get(group.representative)
        .ok_or(ResolutionError::UnknownRecord(group.representative))?;
    let incomplete = |reason| ResolutionError::incomplete(key, reason);

    let change = match decision {
        Decision::SelectContact { address } => {
            let address = address.trim();
            if address.is_empty() {
                return Err(incomplete(IncompleteReason::NoSelection));
            }
            let listed = representative
                .contact_addresses()
                .into_iter()
                .find(|a| a.eq_ignore_ascii_case(address))
                .ok_or_else(|| incomplete(IncompleteReason::NotAListedAddress(address.to_string())))?;
            Change::Contact {
                address: listed,
                is_new: false,
            }
        }
        Decision::NewContact { address } => {
            let address = address.trim();
            if address.is_empty() {
                return Err(incomplete(IncompleteReason::NoSelection));
            }
            if !is_plausible_email(address) {
                return Err(incomplete(IncompleteReason::InvalidNewAddress(address.to_string())));
            }
            Change::Contact {
                address: address.to_string(),
                is_new: true,
            }
        }
        Decision::UseFileAccount => {
            let value = representative
                .payment_account
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| incomplete(IncompleteReason::NoFileAccount))?;
            account_change(value, representative.directory_account_snapshot.as_deref())
        }
        Decision::UseDirectoryAccount => {
            let value = representative
                .directory_account_snapshot
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| incomplete(IncompleteReason::NoDirectoryAccount))?;
            account_change(value, representative.directory_account_snapshot.as_deref())
        }
        Decision::CustomAccount { account } => {
            let len = PaymentAccount::parse(account).map_or(0, |a| a.len());
            let value = PaymentAccount::parse(account)
                .filter(|a| a.len() >= MIN_CUSTOM_ACCOUNT_LEN)
                .ok_or_else(|| {
                    incomplete(IncompleteReason::AccountTooShort {
                        len,
                        min: MIN_CUSTOM_ACCOUNT_LEN,
                    })
                })?;
            account_change(value.as_str(), representative.directory_account_snapshot.as_deref())
        }
        Decision::CompleteFields { values } => {
            if let Some(field) = values.first_missing() {
                return Err(incomplete(IncompleteReason::MissingField(field)));
            }
            Change::Fields(values.clone())
        }
    };

    Ok(PreparedResolution {
        key: key.clone(),
        record_ids: group.record_ids.clone(),
        provider_id: representative.provider_id.clone(),
        change,
    })
}

fn account_change(value: &str, snapshot: Option<&str>) -> Change {
    Change::Account {
        value: value.to_string(),
        write: !snapshot.is_some_and(|s| same_account(value, s)),
    }
}

impl PreparedResolution {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn record_ids(&self) -> &[RecordId] {
        &self.record_ids
    }

    /// Write the decision onto every record of the group and recompute their
    /// status. Returns the directory write this decision calls for.
    pub fn apply(self, records: &mut RecordSet) -> Option<DirectoryUpdate> {
        for id in &self.record_ids {
            let Some(record) = records.get_mut(*id) else {
                continue;
            };
            match &self.change {
                Change::Contact { address, .. } => record.contact_email = Some(address.clone()),
                Change::Account { value, .. } => {
                    record.payment_account = Some(value.clone());
                    record.iban_mismatch = false;
                }
                Change::Fields(values) => {
                    for field in MandatoryField::ALL {
                        if let Some(v) = values.get(field) {
                            record.set_field(field, v);
                        }
                    }
                }
            }
            refresh(record, None);
        }

        let provider_id = self.provider_id?;
        let (patch, origin) = match self.change {
            Change::Contact { is_new: false, .. } | Change::Account { write: false, .. } => {
                return None;
            }
            Change::Contact {
                address,
                is_new: true,
            } => (ProviderPatch::append_email(address), UpdateOrigin::ContactResolution),
            Change::Account { value, write: true } => {
                (ProviderPatch::account(value), UpdateOrigin::AccountResolution)
            }
            Change::Fields(values) => (fields_patch(&values), UpdateOrigin::MandatoryFieldsResolution),
        };
        Some(DirectoryUpdate::new(provider_id, patch, origin))
    }
}

fn fields_patch(values: &MandatoryValues) -> ProviderPatch {
    let owned = |field| values.get(field).map(str::to_string);
    ProviderPatch {
        name: owned(MandatoryField::Name),
        email: owned(MandatoryField::ContactEmail).map(EmailUpdate::Replace),
        address: owned(MandatoryField::Address),
        city: owned(MandatoryField::City),
        postal_code: owned(MandatoryField::PostalCode),
        country: owned(MandatoryField::Country),
        account: owned(MandatoryField::PaymentAccount),
        phone: None,
    }
}
