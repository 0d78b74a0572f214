//! Email extraction, normalization, and validation.
//!
//! Submissions arrive as `application/x-www-form-urlencoded` pairs, either in
//! a query string or a POST body. Handlers pass the raw encoded string here so
//! exactly one decode happens: a second framework-level decode would corrupt
//! addresses with `+` in the local part (`user+tag@example.com`).
//!
//! The pipeline is: percent-decode (`+` means space), trim surrounding
//! whitespace, lowercase, then match a conservative RFC-lite pattern.
//! No length bounds, no internationalized domains, no DNS verification.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::types::EmailAddress;

/// Conservative address pattern: `local@label(.label)+` with alphanumerics
/// and `_.+-` in the local part, alphanumerics and `-` in domain labels.
/// Input is lowercased before matching, so the pattern is lowercase-only.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_.+-]+@[a-z0-9-]+(\.[a-z0-9-]+)+$").expect("email pattern compiles")
});

/// Reasons a submitted address is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    /// The form/query had no `email` field at all.
    #[error("no email provided")]
    Missing,

    /// The field was present but empty after decoding and trimming.
    #[error("empty email")]
    Empty,

    /// A percent escape did not decode to valid UTF-8.
    #[error("malformed form encoding")]
    BadEncoding,

    /// Decoded address did not match the accepted pattern.
    #[error("invalid email address: {0}")]
    Pattern(String),
}

/// Extracts the `email` field from a raw form-urlencoded pair list and
/// validates it.
///
/// `raw` is the undecoded query string or POST body (`a=1&email=x%40y.com`).
pub fn email_from_form(raw: &str) -> Result<EmailAddress, ValidateError> {
    let value = form_field(raw, "email").ok_or(ValidateError::Missing)?;
    normalize_email(value)
}

/// Normalizes and validates a single raw (still percent-encoded) value.
pub fn normalize_email(raw: &str) -> Result<EmailAddress, ValidateError> {
    let decoded = percent_decode(raw).ok_or(ValidateError::BadEncoding)?;
    let normalized = decoded.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidateError::Empty);
    }
    if !EMAIL_RE.is_match(&normalized) {
        return Err(ValidateError::Pattern(normalized));
    }

    Ok(EmailAddress::from_normalized(normalized))
}

/// Finds the first occurrence of `name=` in a form-urlencoded pair list and
/// returns its still-encoded value.
fn form_field<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then_some(value)
    })
}

/// Minimal percent-decoding for form values: `+` becomes a space, `%XX`
/// becomes the byte `0xXX`. Returns `None` if the result is not valid UTF-8.
/// Stray `%` without two hex digits is passed through literally, matching
/// lenient form-decoder behavior.
fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi * 16 + lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).ok()
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
