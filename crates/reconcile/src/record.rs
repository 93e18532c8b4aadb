use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use remitflow_core::{DomainError, Entity};
use remitflow_providers::{ProviderId, split_addresses};

/// Record identifier, unique within one import (1-based row order).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Record validation status, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Valid,
    Warning,
    Error,
}

/// The seven provider fields that must be present before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandatoryField {
    Name,
    Address,
    City,
    PostalCode,
    Country,
    ContactEmail,
    PaymentAccount,
}

impl MandatoryField {
    pub const ALL: [MandatoryField; 7] = [
        MandatoryField::Name,
        MandatoryField::Address,
        MandatoryField::City,
        MandatoryField::PostalCode,
        MandatoryField::Country,
        MandatoryField::ContactEmail,
        MandatoryField::PaymentAccount,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MandatoryField::Name => "name",
            MandatoryField::Address => "address",
            MandatoryField::City => "city",
            MandatoryField::PostalCode => "postal code",
            MandatoryField::Country => "country",
            MandatoryField::ContactEmail => "contact email",
            MandatoryField::PaymentAccount => "payment account",
        }
    }
}

impl core::fmt::Display for MandatoryField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One payment instruction line of the imported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: RecordId,
    pub provider_id: Option<ProviderId>,
    pub provider_name: Option<String>,
    pub payment_account: Option<String>,
    /// Amount in minor currency units (cents).
    pub amount_cents: u64,
    pub invoice_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Possibly multi-valued (`,`/`;` separated) as read from the file.
    pub contact_email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub status: RecordStatus,
    pub validation_message: String,
    pub iban_mismatch: bool,
    /// Directory account at ingestion time. Never rewritten by a resolution.
    pub directory_account_snapshot: Option<String>,
}

impl Entity for InvoiceRecord {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl InvoiceRecord {
    /// A blank, valid record. Ingestion fills in the rest.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            provider_id: None,
            provider_name: None,
            payment_account: None,
            amount_cents: 0,
            invoice_number: None,
            due_date: None,
            contact_email: None,
            address: None,
            city: None,
            postal_code: None,
            country: None,
            phone: None,
            status: RecordStatus::Valid,
            validation_message: String::new(),
            iban_mismatch: false,
            directory_account_snapshot: None,
        }
    }

    /// Individual addresses held in the contact field.
    pub fn contact_addresses(&self) -> Vec<String> {
        self.contact_email.as_deref().map(split_addresses).unwrap_or_default()
    }

    pub fn has_ambiguous_contact(&self) -> bool {
        self.contact_addresses().len() > 1
    }

    /// Value of a mandatory field; blank counts as absent.
    pub fn field(&self, field: MandatoryField) -> Option<&str> {
        let slot = match field {
            MandatoryField::Name => &self.provider_name,
            MandatoryField::Address => &self.address,
            MandatoryField::City => &self.city,
            MandatoryField::PostalCode => &self.postal_code,
            MandatoryField::Country => &self.country,
            MandatoryField::ContactEmail => &self.contact_email,
            MandatoryField::PaymentAccount => &self.payment_account,
        };
        slot.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set_field(&mut self, field: MandatoryField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            MandatoryField::Name => self.provider_name = value,
            MandatoryField::Address => self.address = value,
            MandatoryField::City => self.city = value,
            MandatoryField::PostalCode => self.postal_code = value,
            MandatoryField::Country => self.country = value,
            MandatoryField::ContactEmail => self.contact_email = value,
            MandatoryField::PaymentAccount => self.payment_account = value,
        }
    }

    pub fn missing_fields(&self) -> Vec<MandatoryField> {
        MandatoryField::ALL
            .into_iter()
            .filter(|f| self.field(*f).is_none())
            .collect()
    }

    pub fn is_blocking(&self) -> bool {
        self.status == RecordStatus::Error
    }
}

/// Counts shown next to the review table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
    pub total_amount_cents: u64,
}

/// The records of the current import, in file order.
///
/// Single owner. A resolution builds the next set from a clone and swaps it in
/// whole, so a rejected decision never leaves a half-updated set behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InvoiceRecord>", into = "Vec<InvoiceRecord>")]
pub struct RecordSet {
    records: Vec<InvoiceRecord>,
}

impl RecordSet {
    /// Build a set, rejecting duplicate record identifiers.
    pub fn new(records: Vec<InvoiceRecord>) -> Result<Self, DomainError> {
        let mut seen = std::collections::HashSet::with_capacity(records.len());
        for r in &records {
            if !seen.insert(r.id) {
                return Err(DomainError::invariant(format!("duplicate record id {}", r.id)));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InvoiceRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<InvoiceRecord> {
        self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&InvoiceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Option<&mut InvoiceRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn blocking_records(&self) -> Vec<RecordId> {
        self.records.iter().filter(|r| r.is_blocking()).map(|r| r.id).collect()
    }

    pub fn stats(&self) -> RecordStats {
        self.records.iter().fold(RecordStats::default(), |mut acc, r| {
            match r.status {
                RecordStatus::Valid => acc.valid += 1,
                RecordStatus::Warning => acc.warning += 1,
                RecordStatus::Error => acc.error += 1,
            }
            acc.total_amount_cents = acc.total_amount_cents.saturating_add(r.amount_cents);
            acc
        })
    }
}

impl TryFrom<Vec<InvoiceRecord>> for RecordSet {
    type Error = DomainError;

    fn try_from(value: Vec<InvoiceRecord>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordSet> for Vec<InvoiceRecord> {
    fn from(value: RecordSet) -> Self {
        value.records
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn blank_values_count_as_missing() {
        let mut r = complete(1, "B12345674");
        r.city = Some("   ".to_string());
        r.address = None;
        assert_eq!(r.missing_fields(), vec![MandatoryField::Address, MandatoryField::City]);
    }

    #[test]
    fn contact_with_two_addresses_is_ambiguous() {
        let mut r = complete(1, "B12345674");
        assert!(!r.has_ambiguous_contact());
        r.contact_email = Some("a@x.com; b@x.com".to_string());
        assert!(r.has_ambiguous_contact());
        assert_eq!(r.contact_addresses(), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = RecordSet::new(vec![complete(1, "B12345674"), complete(1, "B12345674")]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn stats_count_by_status_and_sum_amounts() {
        let mut a = complete(1, "B12345674");
        a.status = RecordStatus::Warning;
        let mut b = complete(2, "B12345674");
        b.status = RecordStatus::Error;
        let records = set(vec![a, b, complete(3, "B12345674")]);

        let stats = records.stats();
        assert_eq!((stats.valid, stats.warning, stats.error), (1, 1, 1));
        assert_eq!(stats.total_amount_cents, 375_000);
        assert_eq!(records.blocking_records(), vec![RecordId(2)]);
    }

    #[test]
    fn record_set_deserialisation_enforces_unique_ids() {
        let json = serde_json::to_value(vec![complete(1, "B12345674"), complete(1, "B12345674")]).unwrap();
        assert!(serde_json::from_value::<RecordSet>(json).is_err());
    }
}
