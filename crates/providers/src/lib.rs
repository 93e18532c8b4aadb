//! Provider master-data module.
//!
//! Providers (payees) are identified by a tax identifier and own the canonical
//! name, postal address, contact e-mail and payment account kept in the
//! provider directory. This crate holds the value types, the checksum rules for
//! tax identifiers and IBANs, and the partial-update (patch) model used to
//! request directory corrections. Pure logic only: the directory store itself
//! lives in `remitflow-infra`.

pub mod account;
pub mod contact;
pub mod directory;
pub mod provider;
pub mod tax_id;

pub use account::{PaymentAccount, same_account};
pub use contact::{is_plausible_email, split_addresses};
pub use directory::{DirectoryUpdate, DirectoryWriteFailed, UpdateOrigin};
pub use provider::{EmailUpdate, ProviderDirectoryEntry, ProviderId, ProviderPatch};
