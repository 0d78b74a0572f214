//! Opt-out form and submission handlers.
//!
//! The POST handler takes the raw form body rather than a framework `Form`
//! extractor: the validator owns the single percent-decode step
//! (see [`crate::validate`]), so handing it pre-decoded values would decode
//! twice and corrupt `+` in local parts.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use super::AppState;
use crate::mail::MailTransport;
use crate::store::{AppendOutcome, StoreError};
use crate::validate::email_from_form;

/// Errors that can occur when processing a submission.
#[derive(Debug, Error)]
pub enum UnsubscribeError {
    /// Store failure while checking or appending.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for UnsubscribeError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Renders the opt-out form. No storage side effect, even if a query string
/// is present.
pub async fn unsubscribe_form_handler() -> Html<&'static str> {
    Html(FORM_PAGE)
}

/// Records an opt-out.
///
/// - Invalid or absent address: 400 with an error view, store untouched.
/// - Already present: 200 with an "already unsubscribed" view, no rewrite.
/// - New: appended with the current UTC timestamp, 200 naming the address.
pub async fn unsubscribe_submit_handler<M>(
    State(app_state): State<AppState<M>>,
    body: Bytes,
) -> Result<Response, UnsubscribeError>
where
    M: MailTransport + Send + Sync + 'static,
{
    let raw = String::from_utf8_lossy(&body);

    let email = match email_from_form(&raw) {
        Ok(email) => email,
        Err(e) => {
            warn!(error = %e, "Rejected unsubscribe submission");
            return Ok((StatusCode::BAD_REQUEST, Html(INVALID_PAGE.to_string())).into_response());
        }
    };

    match app_state
        .store()
        .append_if_absent(email.clone(), Utc::now())?
    {
        AppendOutcome::Added(record) => {
            info!(email = %record.email, "Recorded unsubscribe");
            Ok(Html(success_page(record.email.as_str())).into_response())
        }
        AppendOutcome::AlreadyPresent => {
            info!(email = %email, "Duplicate unsubscribe submission");
            Ok(Html(already_page(email.as_str())).into_response())
        }
    }
}

const FORM_PAGE: &str = r#"<html>
<head><title>Unsubscribe</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 50px;">
    <h2>Unsubscribe from our emails</h2>
    <form method="post" action="/unsubscribe">
        <input type="email" name="email" placeholder="you@example.com" required>
        <button type="submit">Unsubscribe</button>
    </form>
</body>
</html>"#;

// The submitted value is not echoed: it failed validation, so it is
// untrusted input.
const INVALID_PAGE: &str = r#"<html>
<head><title>Invalid email</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 50px;">
    <h2 style="color: #E74C3C;">That doesn't look like a valid email address</h2>
    <p style="color: #555;">Please go back and check the address you entered.</p>
</body>
</html>"#;

// Validated addresses contain only [a-z0-9_.+-@], so interpolation into
// HTML is safe here.
fn success_page(email: &str) -> String {
    format!(
        r#"<html>
<head><title>Unsubscribed</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 50px;">
    <h2 style="color: #E74C3C;">You've been unsubscribed</h2>
    <p style="font-size: 18px;">We're sorry to see you go, <strong>{email}</strong>.</p>
    <p style="color: #555;">You will no longer receive emails from us.</p>
</body>
</html>"#
    )
}

fn already_page(email: &str) -> String {
    format!(
        r#"<html>
<head><title>Already unsubscribed</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 50px;">
    <h2>You're already unsubscribed</h2>
    <p style="font-size: 18px;"><strong>{email}</strong> is already on the opt-out list.</p>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_page_names_the_address() {
        let page = success_page("alice@example.com");
        assert!(page.contains("alice@example.com"));
        assert!(page.contains("unsubscribed"));
    }

    #[test]
    fn already_page_names_the_address() {
        let page = already_page("alice@example.com");
        assert!(page.contains("alice@example.com"));
        assert!(page.contains("already"));
    }

    #[test]
    fn invalid_page_does_not_echo_input() {
        // Static by construction; nothing user-controlled can appear.
        assert!(!INVALID_PAGE.contains('{'));
    }
}
