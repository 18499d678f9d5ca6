mod config;
mod registry;
mod repos;
mod scheduler;
mod services;
mod system;

pub use config::{Config, WebhookSettings};
pub use registry::{DuplicateKey, FireAction, Registry, RoomReminder, SilenceOutcome};
use repos::Repos;
pub use repos::{DeleteResult, IReminderRepo, InMemoryReminderRepo};
pub use scheduler::{FiredJob, JobId, JobPurpose, JobScheduler};
pub use services::*;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::ISys;
use system::RealSys;
use tracing::info;

#[derive(Clone)]
pub struct ChimeContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<JobScheduler>,
    pub notifier: Arc<dyn INotifier>,
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> ChimeContext {
    let config = Config::new();
    let repos = match &config.database_url {
        Some(database_url) => Repos::create_postgres(database_url)
            .await
            .expect("Postgres credentials must be set and valid"),
        None => {
            info!("Did not find DATABASE_URL environment variable. Reminders will not survive a restart.");
            Repos::create_inmemory()
        }
    };
    let notifier: Arc<dyn INotifier> = match &config.webhook {
        Some(settings) => Arc::new(WebhookNotifier::new(settings)),
        None => {
            info!("Did not find WEBHOOK_URL environment variable. Notifications will only be logged.");
            Arc::new(InMemoryNotifier::new())
        }
    };
    ChimeContext {
        repos,
        config,
        sys: Arc::new(RealSys {}),
        registry: Arc::new(Registry::new()),
        scheduler: Arc::new(JobScheduler::new()),
        notifier,
    }
}

/// Context where nothing leaves the process, everything lives in memory
/// and time is whatever `sys` says. Used by tests.
pub fn setup_context_inmemory(config: Config, sys: Arc<dyn ISys>) -> ChimeContext {
    ChimeContext {
        repos: Repos::create_inmemory(),
        config,
        sys,
        registry: Arc::new(Registry::new()),
        scheduler: Arc::new(JobScheduler::new()),
        notifier: Arc::new(InMemoryNotifier::new()),
    }
}

pub async fn run_migration(database_url: &str) -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .expect("TO CONNECT TO POSTGRES");

    sqlx::migrate!().run(&pool).await
}
