//! Contact e-mail helpers.

/// Split a possibly multi-valued contact field on `,` or `;`.
///
/// Entries are trimmed and empty entries dropped, so `"a@x.com, ;b@x.com"`
/// yields two addresses.
pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Minimal plausibility check for an operator-typed address.
pub fn is_plausible_email(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && trimmed.contains('@')
}
