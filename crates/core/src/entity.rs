//! Entity trait: identity that survives field edits.

/// Entity marker + minimal interface.
///
/// Invoice records are entities: a resolution rewrites their fields but the
/// record keeps its identifier for the lifetime of the import.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
