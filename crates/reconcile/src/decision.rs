//! Operator decisions, one per conflict group.

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictCategory, GroupKey};
use crate::record::{InvoiceRecord, MandatoryField};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Keep one of the addresses already on the record.
    SelectContact { address: String },
    /// Replace the contact with an address the directory does not know yet.
    NewContact { address: String },
    UseFileAccount,
    UseDirectoryAccount,
    CustomAccount { account: String },
    CompleteFields { values: MandatoryValues },
}

impl Decision {
    pub fn category(&self) -> ConflictCategory {
        match self {
            Decision::SelectContact { .. } | Decision::NewContact { .. } => {
                ConflictCategory::AmbiguousContact
            }
            Decision::UseFileAccount
            | Decision::UseDirectoryAccount
            | Decision::CustomAccount { .. } => ConflictCategory::AccountConflict,
            Decision::CompleteFields { .. } => ConflictCategory::MissingDirectoryFields,
        }
    }
}

/// Values for the seven mandatory provider fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandatoryValues {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub payment_account: Option<String>,
}

impl MandatoryValues {
    /// Trimmed value, or `None` when absent or blank.
    pub fn get(&self, field: MandatoryField) -> Option<&str> {
        let slot = match field {
            MandatoryField::Name => &self.name,
            MandatoryField::Address => &self.address,
            MandatoryField::City => &self.city,
            MandatoryField::PostalCode => &self.postal_code,
            MandatoryField::Country => &self.country,
            MandatoryField::ContactEmail => &self.contact_email,
            MandatoryField::PaymentAccount => &self.payment_account,
        };
        slot.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: MandatoryField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            MandatoryField::Name => self.name = value,
            MandatoryField::Address => self.address = value,
            MandatoryField::City => self.city = value,
            MandatoryField::PostalCode => self.postal_code = value,
            MandatoryField::Country => self.country = value,
            MandatoryField::ContactEmail => self.contact_email = value,
            MandatoryField::PaymentAccount => self.payment_account = value,
        }
    }

    /// First field without a value, in presentation order.
    pub fn first_missing(&self) -> Option<MandatoryField> {
        MandatoryField::ALL.into_iter().find(|f| self.get(*f).is_none())
    }

    pub(crate) fn first_known(records: &[&InvoiceRecord]) -> Self {
        let mut values = Self::default();
        for field in MandatoryField::ALL {
            if let Some(v) = records.iter().find_map(|r| r.field(field)) {
                values.set(field, v);
            }
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDecision {
    pub group: GroupKey,
    pub decision: Decision,
}

/// Decisions for every group of the active stage, confirmed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResolution {
    pub category: ConflictCategory,
    pub decisions: Vec<GroupDecision>,
}
