//! Core domain types for the unsubscribe store.
//!
//! `EmailAddress` is a newtype over a normalized address so the rest of the
//! code cannot accidentally mix raw user input with validated addresses.
//! Normalization and validation live in [`crate::validate`]; this module only
//! defines the shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used in the store file and report attachments.
///
/// ISO-8601 UTC with microseconds and no timezone suffix, e.g.
/// `2026-08-31T09:41:12.503211`.
const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse format; `%.f` accepts an optional fractional-seconds part, so rows
/// written without microseconds still parse.
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A normalized (trimmed, lowercased, validated) email address.
///
/// Construct via [`crate::validate::normalize_email`]. Equality on this type
/// is the store's identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Wraps an already-normalized string.
    ///
    /// Crate-private: the validator is the only production constructor.
    pub(crate) fn from_normalized(s: impl Into<String>) -> Self {
        EmailAddress(s.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored opt-out event: one per address, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeRecord {
    pub email: EmailAddress,
    pub timestamp: DateTime<Utc>,
}

impl UnsubscribeRecord {
    pub fn new(email: EmailAddress, timestamp: DateTime<Utc>) -> Self {
        UnsubscribeRecord { email, timestamp }
    }

    /// Formats the timestamp for the store file / report attachment.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Formats a timestamp in the store's wire format.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.naive_utc().format(TIMESTAMP_WRITE_FORMAT).to_string()
}

/// Parses a timestamp in the store's wire format.
///
/// Returns `None` on malformed input; the store treats such rows the same as
/// any other corrupt row and drops them.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_READ_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
