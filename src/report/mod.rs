//! Report cycle: select recent opt-outs, email them, prune old records.
//!
//! # Algorithm Per Cycle
//!
//! 1. Read every record from the store.
//! 2. Partition by age: `to_report` (inside the report window) and
//!    `to_retain` (inside the retention window). The windows are independent
//!    settings; with the defaults the report set is a subset of the
//!    retained set.
//! 3. If `to_report` is non-empty, compose and send the report message.
//!    A transport failure aborts the cycle BEFORE pruning, so the store is
//!    untouched and the next cycle recomputes from current state — records
//!    are neither lost nor silently dropped from reporting.
//! 4. Prune the store down to the retention window. This runs even when
//!    there was nothing to report. The prune re-reads membership under the
//!    store lock rather than rewriting from the step-1 snapshot, so an
//!    unsubscribe that arrived while the mail was in flight survives.
//!
//! The attachment is composed in memory, so no transient report file exists
//! on disk.

mod scheduler;

pub use scheduler::ReportScheduler;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ReportConfig;
use crate::mail::{MailError, MailTransport, build_report_message};
use crate::store::{HEADER_ROW, RecordStore, StoreError};
use crate::types::UnsubscribeRecord;

/// Errors that can occur during a report cycle.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("mail error: {0}")]
    Mail(#[from] MailError),
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Number of records included in the emailed report (0 = no mail sent).
    pub reported: usize,
    /// Number of records pruned by the retention sweep.
    pub pruned: usize,
}

/// Records split by age against the two windows.
#[derive(Debug, PartialEq, Eq)]
pub struct Partition {
    /// Inside the report window; contents of the next report.
    pub to_report: Vec<UnsubscribeRecord>,
    /// Inside the retention window; everything else is pruned.
    pub to_retain: Vec<UnsubscribeRecord>,
}

/// Partitions records by timestamp against the report and retention windows.
///
/// Both partitions preserve store order. A record can appear in both.
pub fn partition_records(
    records: &[UnsubscribeRecord],
    now: DateTime<Utc>,
    config: &ReportConfig,
) -> Partition {
    let report_cutoff = now - Duration::hours(i64::from(config.report_window_hours));
    let retain_cutoff = now - Duration::hours(i64::from(config.retention_hours));

    Partition {
        to_report: records
            .iter()
            .filter(|r| r.timestamp > report_cutoff)
            .cloned()
            .collect(),
        to_retain: records
            .iter()
            .filter(|r| r.timestamp > retain_cutoff)
            .cloned()
            .collect(),
    }
}

/// Renders records as CSV in the store's wire format (header included).
pub fn render_csv(records: &[UnsubscribeRecord]) -> String {
    let mut out = String::from(HEADER_ROW);
    out.push('\n');
    for record in records {
        out.push_str(record.email.as_str());
        out.push(',');
        out.push_str(&record.format_timestamp());
        out.push('\n');
    }
    out
}

/// Runs one full report cycle against the store.
///
/// Used by both the background scheduler and the manual `/send_report_now`
/// trigger; the manual path does not reset the scheduler's timer.
pub async fn run_report_cycle<M: MailTransport>(
    store: &RecordStore,
    mailer: &M,
    sender: &str,
    config: &ReportConfig,
) -> Result<ReportOutcome, ReportError> {
    let records = store.read_all()?;
    let total = records.len();
    let now = Utc::now();

    let Partition { to_report, .. } = partition_records(&records, now, config);
    let reported = to_report.len();

    if to_report.is_empty() {
        debug!(total, "No recent unsubscribes; skipping report mail");
    } else {
        let csv = render_csv(&to_report);
        let message = build_report_message(
            sender,
            &config.recipients,
            csv,
            config.report_window_hours,
        )?;
        // Send before pruning: on failure we return here and the store is
        // left exactly as it was.
        mailer.send(message).await?;
        info!(reported, "Unsubscribe report sent");
    }

    // Prune against current store state, not the snapshot read above:
    // records appended during the mail send must not be swept away.
    let retain_cutoff = now - Duration::hours(i64::from(config.retention_hours));
    let pruned = store.retain_newer_than(retain_cutoff)?;
    if pruned > 0 {
        info!(pruned, "Pruned expired records");
    }

    Ok(ReportOutcome { reported, pruned })
}
