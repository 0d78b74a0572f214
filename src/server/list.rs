//! Listing endpoint: the full opt-out roster as JSON.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use super::AppState;
use crate::mail::MailTransport;
use crate::store::StoreError;
use crate::types::EmailAddress;

/// Response body of `GET /get_unsubscribes`.
#[derive(Debug, Serialize)]
pub struct UnsubscribeList {
    pub count: usize,
    pub unsubscribed: Vec<EmailAddress>,
}

/// Errors that can occur when listing.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ListError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Returns every stored address, in store order.
pub async fn list_handler<M>(
    State(app_state): State<AppState<M>>,
) -> Result<Json<UnsubscribeList>, ListError>
where
    M: MailTransport + Send + Sync + 'static,
{
    let records = app_state.store().read_all()?;
    let unsubscribed: Vec<EmailAddress> = records.into_iter().map(|r| r.email).collect();

    Ok(Json(UnsubscribeList {
        count: unsubscribed.len(),
        unsubscribed,
    }))
}
