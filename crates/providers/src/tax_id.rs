//! Spanish tax identifier checksums (NIF, NIE, CIF).
//!
//! A failed checksum is a warning, not a hard error: the identifier still
//! keys the provider, it is just suspicious.

const NIF_CONTROL: &[u8; 23] = b"TRWAGMYFPDXBNJZSQVHLCKE";
const CIF_LETTER_CONTROL: &[u8; 10] = b"JABCDEFGHI";
const CIF_ORGANIZATION_TYPES: &str = "ABCDEFGHJNPQRSUVW";

/// Whether `raw` is a checksum-valid NIF, NIE or CIF.
pub fn is_valid(raw: &str) -> bool {
    let id: Vec<u8> = raw
        .trim()
        .to_ascii_uppercase()
        .bytes()
        .filter(|b| *b != b'-')
        .collect();
    if id.len() != 9 {
        return false;
    }

    let first = id[0];
    let last = id[8];

    match first {
        b'X' | b'Y' | b'Z' => {
            let prefix = match first {
                b'X' => b'0',
                b'Y' => b'1',
                _ => b'2',
            };
            let mut digits = vec![prefix];
            digits.extend_from_slice(&id[1..8]);
            nif_control_matches(&digits, last)
        }
        b'0'..=b'9' => nif_control_matches(&id[..8], last),
        c if CIF_ORGANIZATION_TYPES.as_bytes().contains(&c) => cif_control_matches(&id[1..8], last),
        _ => false,
    }
}

fn nif_control_matches(digits: &[u8], control: u8) -> bool {
    let Some(number) = parse_digits(digits) else {
        return false;
    };
    NIF_CONTROL[(number % 23) as usize] == control
}

fn cif_control_matches(digits: &[u8], control: u8) -> bool {
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let mut even_sum = 0u32;
    let mut odd_sum = 0u32;
    for (i, d) in digits.iter().map(|b| u32::from(b - b'0')).enumerate() {
        if i % 2 == 1 {
            even_sum += d;
        } else {
            let doubled = d * 2;
            odd_sum += doubled / 10 + doubled % 10;
        }
    }

    let units = (even_sum + odd_sum) % 10;
    let expected = if units == 0 { 0 } else { 10 - units };

    if control.is_ascii_digit() {
        u32::from(control - b'0') == expected
    } else {
        CIF_LETTER_CONTROL[expected as usize] == control
    }
}

fn parse_digits(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(digits.iter().fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0')))
}
