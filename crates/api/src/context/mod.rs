//! Application context - dependency injection container

use std::sync::Arc;

use calsync_core::{
    EventMapper, OAuthTokenClient, RemoteCalendarClient, SyncOrchestrator, SyncOrchestratorConfig,
    SyncRunLog, TokenStore, WorkItemSource,
};
use calsync_domain::{CalSyncError, CalendarConnection, Config, Result};
use calsync_infra::{
    DbManager, GoogleCalendarClient, GoogleOAuthClient, SqliteEventMappingRepository,
    SqliteSyncRunRepository, SqliteTokenStore, SqliteWorkItemSource, SyncScheduler,
    SyncSchedulerConfig,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub store: Arc<dyn TokenStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl AppContext {
    /// Open the database, run migrations and wire the engine.
    ///
    /// # Errors
    /// Returns `CalSyncError::Config` for an invalid configuration and
    /// `CalSyncError::Database` when the database cannot be prepared.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let store: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::new(Arc::clone(&db)));
        let items: Arc<dyn WorkItemSource> = Arc::new(SqliteWorkItemSource::new(Arc::clone(&db)));
        let mapper: Arc<dyn EventMapper> =
            Arc::new(SqliteEventMappingRepository::new(Arc::clone(&db)));
        let run_log: Arc<dyn SyncRunLog> = Arc::new(SqliteSyncRunRepository::new(Arc::clone(&db)));
        let client: Arc<dyn RemoteCalendarClient> =
            Arc::new(GoogleCalendarClient::new(&config.google)?);
        let oauth: Arc<dyn OAuthTokenClient> = Arc::new(GoogleOAuthClient::new(&config.google)?);

        let orchestrator = SyncOrchestrator::new(Arc::clone(&store), items, mapper, client, oauth)
            .with_config(SyncOrchestratorConfig::from(&config))
            .with_run_log(run_log);

        info!(database = %config.database.path, "application context initialized");

        Ok(Self { config, db, store, orchestrator: Arc::new(orchestrator) })
    }

    /// The connection of `user_id`.
    ///
    /// # Errors
    /// Returns `CalSyncError::NotFound` when the user has not connected a
    /// calendar.
    pub async fn connection_for_user(&self, user_id: i64) -> Result<CalendarConnection> {
        self.store
            .get_connection_for_user(user_id)
            .await?
            .ok_or_else(|| CalSyncError::NotFound(format!("no calendar connection for user {user_id}")))
    }

    /// A scheduler driving this context's orchestrator on the configured cron.
    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::with_config(
            SyncSchedulerConfig::from(&self.config.sync),
            Arc::clone(&self.orchestrator),
        )
    }
}
