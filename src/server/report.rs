//! Manual report trigger.
//!
//! Runs the same cycle as the background scheduler, out-of-band. Triggering
//! does not reset the scheduler's timer. A transport failure maps to an
//! error response; it never crashes the process.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use super::AppState;
use crate::mail::MailTransport;
use crate::report::{ReportError, run_report_cycle};

/// Errors surfaced by the manual trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("report cycle failed: {0}")]
    Cycle(#[from] ReportError),
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let status = match &self {
            // The relay is an upstream dependency; its failures are 502s.
            TriggerError::Cycle(ReportError::Mail(_)) => StatusCode::BAD_GATEWAY,
            TriggerError::Cycle(ReportError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Synchronously runs one report cycle and reports what it did.
pub async fn send_report_now_handler<M>(
    State(app_state): State<AppState<M>>,
) -> Result<(StatusCode, String), TriggerError>
where
    M: MailTransport + Send + Sync + 'static,
{
    let outcome = run_report_cycle(
        app_state.store(),
        app_state.mailer(),
        app_state.sender(),
        app_state.report_config(),
    )
    .await
    .inspect_err(|e| warn!(error = %e, "Manual report trigger failed"))?;

    let body = if outcome.reported == 0 {
        format!(
            "No recent unsubscribes to report. Pruned {} expired record(s).",
            outcome.pruned
        )
    } else {
        format!(
            "Unsubscribe report sent: {} address(es). Pruned {} expired record(s).",
            outcome.reported, outcome.pruned
        )
    };

    Ok((StatusCode::OK, body))
}
