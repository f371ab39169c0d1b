mod api;
mod bootstrap;
mod health;
mod notifier;

use std::time::Duration;

use anyhow::Result;
use estatedesk_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use estatedesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let bootstrap::Application { config, db_pool, service, read_model, notification_worker } = app;

    let router = api::router(service, read_model)
        .merge(health::router(db_pool.clone(), config.notification.enabled));

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "estatedesk-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "estatedesk-server stopping"
    );

    // The router owned the last service handle, so the queue is closed now.
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, notification_worker).await {
        Ok(Ok(())) => tracing::info!(
            event_name = "system.notifications.drained",
            correlation_id = "shutdown",
            "notification backlog drained"
        ),
        Ok(Err(error)) => tracing::warn!(
            event_name = "system.notifications.worker_failed",
            correlation_id = "shutdown",
            error = %error,
            "notification worker ended abnormally"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.notifications.abandoned",
            correlation_id = "shutdown",
            grace_secs = config.server.graceful_shutdown_secs,
            "notification backlog not drained before shutdown deadline"
        ),
    }

    db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
