//! Shared test helpers for `calsync-core` integration tests.
//!
//! In-memory doubles for every port plus a [`Harness`] that wires them into
//! a [`SyncOrchestrator`] so tests can focus on behaviour instead of
//! boilerplate.

#![allow(dead_code)]

pub mod calendar;
pub mod connections;
pub mod repositories;

use std::sync::Arc;
use std::time::Duration;

use calsync_common::resilience::RetryConfig;
use calsync_core::{
    SyncExecutorConfig, SyncOrchestrator, SyncOrchestratorConfig, TokenManagerConfig,
};
use calsync_domain::{CalendarConnection, ItemKind, SyncableItem};
use chrono::{DateTime, TimeZone, Utc};

pub use calendar::{CallKind, MockCalendarClient};
pub use connections::{InMemoryTokenStore, MockOAuthClient};
pub use repositories::{InMemoryEventMapper, InMemorySyncRunLog, InMemoryWorkItemSource};

pub const USER_ID: i64 = 7;
pub const CONNECTION_ID: i64 = 1;
pub const CALENDAR_ID: &str = "primary";
pub const ACCESS_TOKEN: &str = "valid-access-token";

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

/// Task owned by [`USER_ID`] scheduled 10:00-11:00 on 2024-01-01.
pub fn task(local_id: i64, title: &str) -> SyncableItem {
    SyncableItem::new(local_id, ItemKind::Task, title, at(1, 10), at(1, 11), USER_ID)
}

pub fn assignment(local_id: i64, title: &str) -> SyncableItem {
    SyncableItem::new(local_id, ItemKind::Assignment, title, at(2, 9), at(2, 17), USER_ID)
}

/// Connection whose access token is valid for another hour.
pub fn connection(id: i64, user_id: i64) -> CalendarConnection {
    let now = Utc::now();
    CalendarConnection {
        id,
        user_id,
        external_calendar_id: CALENDAR_ID.to_string(),
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: Some("refresh-token".to_string()),
        token_expires_at: Some(now + chrono::Duration::hours(1)),
        last_synced_at: None,
        needs_reauth: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn expired_connection(id: i64, user_id: i64) -> CalendarConnection {
    let mut connection = connection(id, user_id);
    connection.token_expires_at = Some(Utc::now() - chrono::Duration::minutes(5));
    connection
}

/// Retry settings with millisecond delays.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(3)
        .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(5))
        .max_delay(Duration::from_millis(10))
        .build()
        .unwrap()
}

pub fn fast_token_config() -> TokenManagerConfig {
    TokenManagerConfig { refresh_retry: fast_retry(), ..TokenManagerConfig::default() }
}

pub fn fast_config() -> SyncOrchestratorConfig {
    SyncOrchestratorConfig {
        token: fast_token_config(),
        executor: SyncExecutorConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            time_zone: "UTC".to_string(),
        },
    }
}

/// Orchestrator wired to in-memory doubles, seeded with connection
/// [`CONNECTION_ID`] for [`USER_ID`].
pub struct Harness {
    pub store: Arc<InMemoryTokenStore>,
    pub items: Arc<InMemoryWorkItemSource>,
    pub mapper: Arc<InMemoryEventMapper>,
    pub client: Arc<MockCalendarClient>,
    pub oauth: Arc<MockOAuthClient>,
    pub runs: Arc<InMemorySyncRunLog>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_connection(connection(CONNECTION_ID, USER_ID))
    }

    pub fn with_connection(connection: CalendarConnection) -> Self {
        Self::build(connection, MockCalendarClient::new())
    }

    pub fn build(connection: CalendarConnection, client: MockCalendarClient) -> Self {
        let store = Arc::new(InMemoryTokenStore::new());
        store.insert(connection);
        let items = Arc::new(InMemoryWorkItemSource::new());
        let mapper = Arc::new(InMemoryEventMapper::new());
        let client = Arc::new(client);
        let oauth = Arc::new(MockOAuthClient::new());
        let runs = Arc::new(InMemorySyncRunLog::new());

        let orchestrator = SyncOrchestrator::new(
            store.clone(),
            items.clone(),
            mapper.clone(),
            client.clone(),
            oauth.clone(),
        )
        .with_config(fast_config())
        .with_run_log(runs.clone());

        Self { store, items, mapper, client, oauth, runs, orchestrator: Arc::new(orchestrator) }
    }

    pub fn connection(&self) -> CalendarConnection {
        self.store.connection(CONNECTION_ID).unwrap()
    }
}
