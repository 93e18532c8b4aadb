//! Payment accounts (IBAN strings as read from the file or the directory).

use serde::{Deserialize, Serialize};

use remitflow_core::ValueObject;

const IBAN_MIN_LEN: usize = 15;
const IBAN_MAX_LEN: usize = 34;

/// A normalised payment account: spaces and dashes removed, upper-cased.
///
/// Comparison between the file value and the directory value always goes
/// through this type, so `"ES91 2100 0418"` and `"es9121000418"` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentAccount(String);

impl ValueObject for PaymentAccount {}

impl PaymentAccount {
    /// Normalise a raw account string. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// IBAN structural check: length bounds plus ISO 13616 mod-97.
    pub fn is_valid_iban(&self) -> bool {
        let len = self.0.len();
        if !(IBAN_MIN_LEN..=IBAN_MAX_LEN).contains(&len) {
            return false;
        }
        if !self.0.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return false;
        }

        let (head, tail) = self.0.split_at(4);
        let mut remainder: u32 = 0;
        for b in tail.bytes().chain(head.bytes()) {
            if b.is_ascii_digit() {
                remainder = (remainder * 10 + u32::from(b - b'0')) % 97;
            } else {
                let value = u32::from(b - b'A') + 10;
                remainder = (remainder * 100 + value) % 97;
            }
        }
        remainder == 1
    }
}

impl core::fmt::Display for PaymentAccount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip spaces and dashes and upper-case.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Whether two raw account strings denote the same account.
pub fn same_account(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
