//! Flat-file record store for opt-out events.
//!
//! # File Format
//!
//! Newline-delimited, comma-separated UTF-8 text. The first row is the
//! literal header `email,timestamp`; every following row is
//! `<email>,<ISO-8601 UTC timestamp, no timezone suffix>`. Rows that are not
//! exactly two fields, hold invalid UTF-8, or carry an unparseable timestamp
//! are dropped silently on read: the store tolerates corruption rather than
//! detecting it, one row at a time.
//!
//! # Locking
//!
//! One process-wide mutex serializes every operation. The duplicate check in
//! [`RecordStore::append_if_absent`] and the append itself run inside the
//! same critical section, so concurrent identical submissions cannot create
//! two records for one address. Nothing `.await`s while the lock is held.
//!
//! # Atomic Rewrites
//!
//! [`RecordStore::replace_all`] uses write-to-temp-then-rename:
//! 1. Write `<store>.tmp`
//! 2. fsync the file
//! 3. Rename over the store path
//! 4. fsync the directory
//!
//! Readers always see either the old or the new contents, never a partial
//! write.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{EmailAddress, UnsubscribeRecord, parse_timestamp};

/// Fixed two-field header, always the first row of the store file.
pub const HEADER_ROW: &str = "email,timestamp";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The store mutex was poisoned by a panic in another thread.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of an append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new record was written.
    Added(UnsubscribeRecord),
    /// The address already had a record; the store was not touched.
    AlreadyPresent,
}

/// File-backed store of [`UnsubscribeRecord`]s, one per normalized address.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RecordStore {
    /// Opens the store at `path`, creating the file with a header row if it
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let mut file = File::create(&path)?;
            writeln!(file, "{HEADER_ROW}")?;
            file.sync_all()?;
        }
        Ok(RecordStore {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records in file order.
    ///
    /// The first row is treated as the header and skipped unconditionally.
    /// Malformed rows are dropped without error.
    pub fn read_all(&self) -> Result<Vec<UnsubscribeRecord>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.read_all_locked()
    }

    /// Appends a record for `email` unless one already exists.
    ///
    /// The existence scan and the append form one critical section, so two
    /// concurrent submissions of the same address yield exactly one record.
    pub fn append_if_absent(
        &self,
        email: EmailAddress,
        timestamp: DateTime<Utc>,
    ) -> Result<AppendOutcome> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;

        let existing = self.read_all_locked()?;
        if existing.iter().any(|r| r.email == email) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        let record = UnsubscribeRecord::new(email, timestamp);
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{},{}", record.email, record.format_timestamp())?;
        file.sync_all()?;

        Ok(AppendOutcome::Added(record))
    }

    /// Atomically replaces the store contents with `records` (plus header).
    pub fn replace_all(&self, records: &[UnsubscribeRecord]) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.write_all_locked(records)
    }

    /// Drops every record with `timestamp <= cutoff`, returning how many
    /// were pruned.
    ///
    /// Read, filter, and rewrite form one critical section, so records
    /// appended concurrently (e.g. while a report mail was in flight) are
    /// re-read here and survive the sweep.
    pub fn retain_newer_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;

        let records = self.read_all_locked()?;
        let total = records.len();
        let retained: Vec<UnsubscribeRecord> =
            records.into_iter().filter(|r| r.timestamp > cutoff).collect();

        let pruned = total - retained.len();
        if pruned > 0 {
            self.write_all_locked(&retained)?;
        }
        Ok(pruned)
    }

    fn read_all_locked(&self) -> Result<Vec<UnsubscribeRecord>> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;

        // Lossy decode: a corrupt byte poisons only its own row, which then
        // fails parse_row, not the whole store.
        let contents = String::from_utf8_lossy(&bytes);
        let records = contents
            .lines()
            .skip(1) // header
            .filter_map(parse_row)
            .collect();
        Ok(records)
    }

    fn write_all_locked(&self, records: &[UnsubscribeRecord]) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            writeln!(tmp, "{HEADER_ROW}")?;
            for record in records {
                writeln!(tmp, "{},{}", record.email, record.format_timestamp())?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        fsync_parent_dir(&self.path)?;

        Ok(())
    }
}

/// Parses one data row, returning `None` for anything malformed.
fn parse_row(line: &str) -> Option<UnsubscribeRecord> {
    // A replacement character means the row held invalid UTF-8 on disk.
    if line.contains('\u{FFFD}') {
        return None;
    }

    let mut fields = line.split(',');
    let email = fields.next()?;
    let timestamp = fields.next()?;
    if fields.next().is_some() || email.is_empty() {
        return None;
    }

    let timestamp = parse_timestamp(timestamp)?;
    Some(UnsubscribeRecord::new(
        EmailAddress::from_normalized(email),
        timestamp,
    ))
}

/// Syncs the directory containing `path`, making a rename durable.
///
/// Without this, a rename may not survive power loss even though the file
/// contents were synced.
fn fsync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let dir = OpenOptions::new().read(true).open(parent)?;
        dir.sync_all()?;
    }
    Ok(())
}
