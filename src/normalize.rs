// 🔑 Key Normalizer - canonical forms for identifiers and phone numbers
// All functions are pure and total: any input yields an output, never an error

use serde::{Deserialize, Serialize};

/// Canonical width of a personal identifier (CPF)
pub const IDENTIFIER_WIDTH: usize = 11;

/// Country calling code prepended to national mobile numbers
pub const COUNTRY_CODE: &str = "55";

/// Digits of a national mobile number (DDD + 9-digit subscriber)
pub const NATIONAL_PHONE_DIGITS: usize = 11;

/// Digits of an international mobile number (55 + DDD + 9-digit subscriber)
pub const INTERNATIONAL_PHONE_DIGITS: usize = 13;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Keep only ASCII digits
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// True when the value is non-empty and made only of ASCII digits
pub fn is_all_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit())
}

/// Canonical key of an identifier.
///
/// Strips non-digits and left-pads with zeros to 11 characters. Longer digit
/// strings are kept whole. A missing value, or one without any digit, yields
/// the empty string so it never collides with a real key.
///
/// # Examples
/// * `"123.456.789-09"` → `"12345678909"`
/// * `"1234"` → `"00000001234"`
/// * `None` → `""`
pub fn normalize_identifier<'a, T>(raw: T) -> String
where
    T: Into<Option<&'a str>>,
{
    let Some(raw) = raw.into() else {
        return String::new();
    };
    let digits = digits_only(raw);
    if digits.is_empty() {
        return digits;
    }
    format!("{:0>width$}", digits, width = IDENTIFIER_WIDTH)
}

/// Display form of an identifier; same canonical text as the key
pub fn format_identifier<'a, T>(raw: T) -> String
where
    T: Into<Option<&'a str>>,
{
    normalize_identifier(raw)
}

// ============================================================================
// PHONES
// ============================================================================

/// True when the digit count of `raw` equals `expected_len`
pub fn is_valid_phone_digits(raw: &str, expected_len: usize) -> bool {
    raw.chars().filter(|c| c.is_ascii_digit()).count() == expected_len
}

/// `55` + number when the trimmed value is exactly 11 digits
pub fn add_country_prefix(raw: &str) -> Option<String> {
    let v = raw.trim();
    (v.len() == NATIONAL_PHONE_DIGITS && is_all_digits(v)).then(|| format!("{}{}", COUNTRY_CODE, v))
}

/// Number without `55` when the trimmed value has 13 characters and starts with it
pub fn strip_country_prefix(raw: &str) -> Option<String> {
    let v = raw.trim();
    if v.chars().count() == INTERNATIONAL_PHONE_DIGITS && v.starts_with(COUNTRY_CODE) {
        Some(v[COUNTRY_CODE.len()..].to_string())
    } else {
        None
    }
}

/// International number with the mobile `9` in place.
///
/// A 12-character value is missing the `9` after `55` + DDD and gets it; a
/// 13-character value is already complete; anything else is invalid.
pub fn insert_mobile_nine(raw: &str) -> Option<String> {
    let v = raw.trim();
    let chars: Vec<char> = v.chars().collect();
    match chars.len() {
        12 => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[4..].iter().collect();
            Some(format!("{}9{}", head, tail))
        }
        13 => Some(v.to_string()),
        _ => None,
    }
}

/// Drop the last digit of a 12-digit value
pub fn trim_to_eleven(raw: &str) -> Option<String> {
    let v = raw.trim();
    (v.len() == 12 && is_all_digits(v)).then(|| v[..11].to_string())
}

/// Split an 11-digit national number into (area code, subscriber number)
pub fn split_area_code(raw: &str) -> Option<(String, String)> {
    let v = raw.trim();
    (v.len() == NATIONAL_PHONE_DIGITS && is_all_digits(v)).then(|| (v[..2].to_string(), v[2..].to_string()))
}

// ============================================================================
// KEY NORMALIZATION STRATEGY
// ============================================================================

/// How a key or value is canonicalized before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyNormalization {
    /// Digits only, zero-padded to 11
    Identifier,
    /// Digits only
    Digits,
    /// Surrounding whitespace removed
    Trimmed,
    /// Trimmed and upper-cased
    Uppercase,
}

impl KeyNormalization {
    pub fn apply(&self, raw: Option<&str>) -> String {
        match self {
            KeyNormalization::Identifier => normalize_identifier(raw),
            KeyNormalization::Digits => raw.map(digits_only).unwrap_or_default(),
            KeyNormalization::Trimmed => raw.map(|v| v.trim().to_string()).unwrap_or_default(),
            KeyNormalization::Uppercase => raw.map(|v| v.trim().to_uppercase()).unwrap_or_default(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KeyNormalization::Identifier => "identifier",
            KeyNormalization::Digits => "digits",
            KeyNormalization::Trimmed => "trimmed",
            KeyNormalization::Uppercase => "uppercase",
        }
    }
}
