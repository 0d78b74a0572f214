//! Liveness endpoint.

use axum::http::StatusCode;

/// Returns 200 OK with the text "OK". Used to verify the server is up and
/// accepting connections.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
