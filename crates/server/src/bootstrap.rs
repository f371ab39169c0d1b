use std::sync::Arc;

use estatedesk_core::config::{AppConfig, ConfigError};
use estatedesk_core::notification::{NoopNotifier, NotificationQueue, Notifier};
use estatedesk_core::service::{NotificationSettings, RequestService};
use estatedesk_core::store::RequestReadModel;
use estatedesk_db::{connect_with_settings, migrations, DbPool, SqlRequestStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifier::HttpNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<RequestService>,
    pub read_model: Arc<dyn RequestReadModel>,
    /// Finishes once every handle to the service is dropped and the
    /// notification backlog has drained.
    pub notification_worker: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification client could not be built: {0}")]
    NotifierClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier: Arc<dyn Notifier> = if config.notification.enabled {
        Arc::new(HttpNotifier::new(&config.notification).map_err(BootstrapError::NotifierClient)?)
    } else {
        Arc::new(NoopNotifier)
    };
    let (queue, notification_worker) =
        NotificationQueue::spawn(notifier, config.notification.queue_capacity);
    info!(
        event_name = "system.bootstrap.notifications_ready",
        correlation_id = "bootstrap",
        transport = if config.notification.enabled { "http" } else { "noop" },
        queue_capacity = config.notification.queue_capacity,
        "notification queue started"
    );

    let store = Arc::new(SqlRequestStore::new(db_pool.clone()));
    let service = Arc::new(RequestService::new(
        store.clone(),
        Arc::new(queue),
        NotificationSettings::from(&config.notification),
    ));

    Ok(Application { config, db_pool, service, read_model: store, notification_worker })
}
