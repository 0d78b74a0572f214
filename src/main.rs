use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use optout::config::Config;
use optout::mail::SmtpMailer;
use optout::report::ReportScheduler;
use optout::server::{AppState, build_router};
use optout::store::RecordStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = Arc::new(RecordStore::open(&config.store_path)?);
    let mailer = SmtpMailer::new(&config.smtp)?;

    let shutdown = CancellationToken::new();
    let scheduler = ReportScheduler::new(
        store.clone(),
        mailer.clone(),
        config.smtp.sender.clone(),
        config.report.clone(),
        config.report_interval,
    );
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    let state = AppState::new(
        store,
        mailer,
        config.smtp.sender.clone(),
        config.report.clone(),
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        })
        .await?;

    // Make sure the scheduler stops even if serve returned without the
    // signal future firing.
    shutdown.cancel();
    let _ = scheduler_task.await;

    Ok(())
}
