//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In this
/// workspace the normalised tax identifier and the normalised payment account
/// are value objects: two records carrying `"es 1234"` and `"ES1234"` hold the
/// same account.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PaymentAccount(String);
///
/// impl ValueObject for PaymentAccount {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
