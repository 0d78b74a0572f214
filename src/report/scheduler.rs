//! Background report scheduler.
//!
//! One perpetual task that wakes on a fixed interval and runs a report
//! cycle. Per-cycle failures are logged and never terminate the loop;
//! cancellation is the only way out. No schedule state is persisted, so a
//! process restart resets the wait from zero.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::run_report_cycle;
use crate::config::ReportConfig;
use crate::mail::MailTransport;
use crate::store::RecordStore;

/// Owns everything a report cycle needs and drives the interval loop.
pub struct ReportScheduler<M> {
    store: Arc<RecordStore>,
    mailer: M,
    sender: String,
    config: ReportConfig,
    interval: Duration,
}

impl<M: MailTransport> ReportScheduler<M> {
    pub fn new(
        store: Arc<RecordStore>,
        mailer: M,
        sender: impl Into<String>,
        config: ReportConfig,
        interval: Duration,
    ) -> Self {
        ReportScheduler {
            store,
            mailer,
            sender: sender.into(),
            config,
            interval,
        }
    }

    /// Runs the scheduler until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Report scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping report scheduler");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    match run_report_cycle(&self.store, &self.mailer, &self.sender, &self.config)
                        .await
                    {
                        Ok(outcome) => {
                            info!(
                                reported = outcome.reported,
                                pruned = outcome.pruned,
                                "Report cycle complete"
                            );
                        }
                        Err(e) => {
                            // Availability over reporting reliability: log and
                            // wait for the next interval.
                            error!(error = %e, "Report cycle failed");
                        }
                    }
                }
            }
        }

        info!("Report scheduler stopped");
    }
}
