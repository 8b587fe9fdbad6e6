//! Shared helpers for `calsync-infra` integration tests.
//!
//! Provides a temporary migrated database, seeding helpers for the host
//! application's tables and a factory wiring the real adapters against a
//! WireMock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use calsync_core::{
    SyncExecutorConfig, SyncOrchestrator, SyncOrchestratorConfig, TokenManagerConfig, TokenStore,
};
use calsync_domain::{CalendarConnection, NewConnection};
use calsync_infra::database::{
    DbManager, SqliteEventMappingRepository, SqliteSyncRunRepository, SqliteTokenStore,
    SqliteWorkItemSource,
};
use calsync_infra::{GoogleCalendarClient, GoogleOAuthClient};
use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

pub const USER_ID: i64 = 7;
pub const CALENDAR_ID: &str = "primary";
pub const ACCESS_TOKEN: &str = "live-access-token";
pub const REFRESH_TOKEN: &str = "stored-refresh-token";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new migrated database in a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("calsync-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }

    pub fn token_store(&self) -> SqliteTokenStore {
        SqliteTokenStore::new(Arc::clone(&self.manager))
    }

    /// Store a connection for [`USER_ID`] whose token is valid for an hour.
    pub async fn seed_connection(&self) -> CalendarConnection {
        self.seed_connection_expiring_in(ChronoDuration::hours(1)).await
    }

    pub async fn seed_connection_expiring_in(&self, ttl: ChronoDuration) -> CalendarConnection {
        self.token_store()
            .upsert_connection(&NewConnection {
                user_id: USER_ID,
                external_calendar_id: CALENDAR_ID.to_string(),
                access_token: ACCESS_TOKEN.to_string(),
                refresh_token: Some(REFRESH_TOKEN.to_string()),
                token_expires_at: Some(Utc::now() + ttl),
            })
            .await
            .expect("connection should be stored")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn calendar_client(server_uri: &str) -> GoogleCalendarClient {
    GoogleCalendarClient::with_base_url(&format!("{server_uri}/calendar/v3"), Duration::from_secs(2))
        .expect("calendar client should build")
}

pub fn oauth_client(server_uri: &str) -> GoogleOAuthClient {
    GoogleOAuthClient::with_endpoints(
        "test-client",
        "test-secret",
        &format!("{server_uri}/token"),
        &format!("{server_uri}/revoke"),
        Duration::from_secs(2),
    )
    .expect("oauth client should build")
}

/// Orchestrator over the real SQLite and Google adapters, with retry
/// backoff shortened for tests.
pub fn orchestrator(db: &TestDatabase, server_uri: &str) -> SyncOrchestrator {
    let manager = &db.manager;
    SyncOrchestrator::new(
        Arc::new(SqliteTokenStore::new(Arc::clone(manager))),
        Arc::new(SqliteWorkItemSource::new(Arc::clone(manager))),
        Arc::new(SqliteEventMappingRepository::new(Arc::clone(manager))),
        Arc::new(calendar_client(server_uri)),
        Arc::new(oauth_client(server_uri)),
    )
    .with_config(SyncOrchestratorConfig {
        token: TokenManagerConfig::default(),
        executor: SyncExecutorConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(5),
            time_zone: "Europe/Berlin".to_string(),
        },
    })
    .with_run_log(Arc::new(SqliteSyncRunRepository::new(Arc::clone(manager))))
}
