//! HTTP surface of the unsubscribe service.
//!
//! # Endpoints
//!
//! - `GET /` - Liveness text
//! - `GET /unsubscribe` - Renders the opt-out form (no side effect)
//! - `POST /unsubscribe` - Validates and records an opt-out
//! - `GET /get_unsubscribes` - Lists all stored addresses as JSON
//! - `GET /send_report_now` - Runs a report cycle out-of-band
//!
//! No route requires authentication: this is a deliberately open one-click
//! unsubscribe surface.

use std::sync::Arc;

pub mod health;
pub mod list;
pub mod report;
pub mod unsubscribe;

pub use health::health_handler;
pub use list::list_handler;
pub use report::send_report_now_handler;
pub use unsubscribe::{unsubscribe_form_handler, unsubscribe_submit_handler};

use crate::config::ReportConfig;
use crate::mail::MailTransport;
use crate::store::RecordStore;

/// Shared application state, passed to handlers via Axum's `State` extractor.
///
/// Generic over the mail transport so router tests can swap in a mock.
pub struct AppState<M> {
    inner: Arc<AppStateInner<M>>,
}

struct AppStateInner<M> {
    /// Record store, shared with the background scheduler.
    store: Arc<RecordStore>,

    /// Transport used by the manual report trigger.
    mailer: M,

    /// Sender address for report mail.
    sender: String,

    /// Report windows and recipients.
    report: ReportConfig,
}

// Manual Clone: the derive would demand `M: Clone`, but the Arc makes
// cloning cheap for any `M`.
impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        AppState {
            inner: self.inner.clone(),
        }
    }
}

impl<M> AppState<M> {
    pub fn new(
        store: Arc<RecordStore>,
        mailer: M,
        sender: impl Into<String>,
        report: ReportConfig,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                store,
                mailer,
                sender: sender.into(),
                report,
            }),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.inner.store
    }

    pub fn mailer(&self) -> &M {
        &self.inner.mailer
    }

    pub fn sender(&self) -> &str {
        &self.inner.sender
    }

    pub fn report_config(&self) -> &ReportConfig {
        &self.inner.report
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<M>(app_state: AppState<M>) -> axum::Router
where
    M: MailTransport + Send + Sync + 'static,
{
    use axum::routing::get;

    axum::Router::new()
        .route("/", get(health_handler))
        .route(
            "/unsubscribe",
            get(unsubscribe_form_handler).post(unsubscribe_submit_handler::<M>),
        )
        .route("/get_unsubscribes", get(list_handler::<M>))
        .route("/send_report_now", get(send_report_now_handler::<M>))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::test_utils::MockMailer;
    use crate::types::EmailAddress;

    fn test_report_config() -> ReportConfig {
        ReportConfig {
            recipients: vec!["reports@example.com".to_string()],
            report_window_hours: 2,
            retention_hours: 12,
        }
    }

    /// Creates app state over a fresh store in a temporary directory.
    fn test_app_state(mailer: MockMailer) -> (AppState<MockMailer>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path().join("unsubscribes.csv")).unwrap());
        let state = AppState::new(store, mailer, "sender@example.com", test_report_config());
        (state, dir)
    }

    fn unsubscribe_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/unsubscribe")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ─── Liveness ───

    #[tokio::test]
    async fn root_returns_200_ok() {
        let (state, _dir) = test_app_state(MockMailer::default());
        let app = build_router(state);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    // ─── Unsubscribe form ───

    #[tokio::test]
    async fn get_unsubscribe_renders_form_without_side_effect() {
        let (state, _dir) = test_app_state(MockMailer::default());
        let store = state.store().path().to_path_buf();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/unsubscribe?email=alice%40example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<form"));

        // The query parameter must not be written anywhere.
        let contents = std::fs::read_to_string(store).unwrap();
        assert_eq!(contents, "email,timestamp\n");
    }

    // ─── Unsubscribe submission ───

    #[tokio::test]
    async fn post_unsubscribe_records_address() {
        let (state, _dir) = test_app_state(MockMailer::default());
        let app = build_router(state.clone());

        let response = app
            .oneshot(unsubscribe_post("email=Alice%40Example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("alice@example.com"));

        let records = state.store().read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email.as_str(), "alice@example.com");
    }

    #[tokio::test]
    async fn repeated_post_is_idempotent() {
        let (state, _dir) = test_app_state(MockMailer::default());

        let app = build_router(state.clone());
        let first = app
            .oneshot(unsubscribe_post("email=alice%40example.com"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let app = build_router(state.clone());
        let second = app
            .oneshot(unsubscribe_post("email=alice%40example.com"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let body = body_text(second).await;
        assert!(body.contains("already unsubscribed"));

        assert_eq!(state.store().read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_without_storage() {
        let (state, _dir) = test_app_state(MockMailer::default());

        for body in ["email=", "email=not-an-email", "email=a%40b", "other=1"] {
            let app = build_router(state.clone());
            let response = app.oneshot(unsubscribe_post(body)).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::BAD_REQUEST,
                "body {body:?} must be rejected"
            );
        }

        assert!(state.store().read_all().unwrap().is_empty());
    }

    // ─── Listing ───

    #[tokio::test]
    async fn get_unsubscribes_returns_count_and_addresses_in_order() {
        let (state, _dir) = test_app_state(MockMailer::default());
        for name in ["alice", "bob"] {
            state
                .store()
                .append_if_absent(
                    EmailAddress::from_normalized(format!("{name}@example.com")),
                    Utc::now(),
                )
                .unwrap();
        }
        let app = build_router(state);

        let request = Request::builder()
            .uri("/get_unsubscribes")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["unsubscribed"][0], "alice@example.com");
        assert_eq!(parsed["unsubscribed"][1], "bob@example.com");
    }

    // ─── Manual report trigger ───

    #[tokio::test]
    async fn send_report_now_reports_and_prunes() {
        let mailer = MockMailer::default();
        let (state, _dir) = test_app_state(mailer.clone());
        state
            .store()
            .append_if_absent(
                EmailAddress::from_normalized("fresh@example.com"),
                Utc::now() - Duration::hours(1),
            )
            .unwrap();
        state
            .store()
            .append_if_absent(
                EmailAddress::from_normalized("stale@example.com"),
                Utc::now() - Duration::hours(13),
            )
            .unwrap();
        let app = build_router(state.clone());

        let request = Request::builder()
            .uri("/send_report_now")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(mailer.sent().len(), 1);
        assert!(mailer.sent()[0].contains("fresh@example.com"));

        let remaining = state.store().read_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email.as_str(), "fresh@example.com");
    }

    #[tokio::test]
    async fn send_report_now_transport_failure_is_an_error_response() {
        let (state, _dir) = test_app_state(MockMailer::failing());
        state
            .store()
            .append_if_absent(EmailAddress::from_normalized("fresh@example.com"), Utc::now())
            .unwrap();
        let before = std::fs::read_to_string(state.store().path()).unwrap();
        let app = build_router(state.clone());

        let request = Request::builder()
            .uri("/send_report_now")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        // Failed send must not prune.
        let after = std::fs::read_to_string(state.store().path()).unwrap();
        assert_eq!(before, after);
    }
}
