use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use remitflow_core::{DomainError, DomainResult, ValueObject};

use crate::contact::split_addresses;
use crate::tax_id;

/// Provider identifier: the payee's tax identifier, trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ValueObject for ProviderId {}

impl ProviderId {
    /// Parse a raw tax identifier. Blank input is rejected; a failed checksum
    /// is not (see [`ProviderId::is_checksum_valid`]).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::invalid_id("tax identifier cannot be empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_checksum_valid(&self) -> bool {
        tax_id::is_valid(&self.0)
    }
}

impl core::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

/// Canonical master data for one provider, as held by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDirectoryEntry {
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub account: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderDirectoryEntry {
    /// An entry with nothing but its key (directory updates are upserts).
    pub fn new(provider_id: ProviderId, at: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            name: None,
            email: None,
            address: None,
            city: None,
            postal_code: None,
            country: None,
            account: None,
            phone: None,
            updated_at: at,
        }
    }

    /// Merge a partial update. Fields absent from the patch are kept.
    pub fn apply(&mut self, patch: &ProviderPatch, at: DateTime<Utc>) {
        let set = |slot: &mut Option<String>, value: &Option<String>| {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        };
        set(&mut self.name, &patch.name);
        set(&mut self.address, &patch.address);
        set(&mut self.city, &patch.city);
        set(&mut self.postal_code, &patch.postal_code);
        set(&mut self.country, &patch.country);
        set(&mut self.account, &patch.account);
        set(&mut self.phone, &patch.phone);

        match &patch.email {
            Some(EmailUpdate::Replace(v)) => self.email = Some(v.clone()),
            Some(EmailUpdate::Append(v)) => {
                self.email = Some(append_address(self.email.as_deref(), v));
            }
            None => {}
        }

        self.updated_at = at;
    }
}

/// How a patch changes the stored e-mail value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum EmailUpdate {
    /// Overwrite the stored value.
    Replace(String),
    /// Add one address to the stored list, comma-joined. Prior addresses are kept.
    Append(String),
}

/// Partial update of a directory entry (`None` = leave unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProviderPatch {
    pub fn account(value: impl Into<String>) -> Self {
        Self {
            account: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn append_email(value: impl Into<String>) -> Self {
        Self {
            email: Some(EmailUpdate::Append(value.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn append_address(stored: Option<&str>, new: &str) -> String {
    let new = new.trim();
    let mut existing = stored.map(split_addresses).unwrap_or_default();
    if !existing.iter().any(|a| a.eq_ignore_ascii_case(new)) {
        existing.push(new.to_string());
    }
    existing.join(", ")
}
