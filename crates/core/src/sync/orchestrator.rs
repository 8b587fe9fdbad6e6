//! Sync orchestration - public entry point of the engine
//!
//! Resolves the connection, obtains a token, loads items and mappings,
//! plans and executes. At most one run per connection is in flight at a
//! time; user-triggered runs queue behind it, scheduled runs coalesce.

use std::sync::Arc;

use calsync_domain::{
    AuthError, CalendarConnection, Config, ConnectionState, ConnectionStatus, EventQuery,
    ItemKind, RemoteError, SyncAbort, SyncResult, SyncRun, SyncRunStatus, SyncTrigger,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::diff::DiffEngine;
use super::error::SyncError;
use super::executor::{SyncExecutor, SyncExecutorConfig};
use super::ports::{EventMapper, RemoteCalendarClient, SyncRunLog, WorkItemSource};
use crate::auth::{OAuthTokenClient, TokenManager, TokenManagerConfig, TokenStore};

/// Tuning for [`SyncOrchestrator`]
#[derive(Debug, Clone, Default)]
pub struct SyncOrchestratorConfig {
    pub token: TokenManagerConfig,
    pub executor: SyncExecutorConfig,
}

impl From<&Config> for SyncOrchestratorConfig {
    fn from(config: &Config) -> Self {
        let margin_secs = i64::try_from(config.sync.token_refresh_margin_secs).unwrap_or(i64::MAX);
        let refresh_margin =
            chrono::Duration::try_seconds(margin_secs).unwrap_or(chrono::Duration::MAX);
        Self {
            token: TokenManagerConfig {
                refresh_margin,
                ..TokenManagerConfig::default()
            },
            executor: SyncExecutorConfig {
                max_retries: config.sync.max_retries,
                initial_backoff: std::time::Duration::from_millis(config.sync.initial_backoff_ms),
                time_zone: config.google.time_zone.clone(),
            },
        }
    }
}

/// Result of one connection in a fan-out run.
#[derive(Debug)]
pub struct ConnectionOutcome {
    pub connection_id: i64,
    /// `Ok(None)` when the connection was already syncing.
    pub outcome: Result<Option<SyncResult>, SyncError>,
}

/// Result of [`SyncOrchestrator::verify_connection`].
#[derive(Debug)]
pub struct TokenCheck {
    /// Connection state after the check, including any refreshed token
    pub connection: CalendarConnection,
    /// Whether the stored token was replaced during the check
    pub refreshed: bool,
    /// Engine-created events returned by the check request
    pub sample_events: usize,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    All,
    One { local_id: i64, kind: ItemKind },
}

/// Drives token validation, planning and execution for calendar
/// connections.
pub struct SyncOrchestrator {
    store: Arc<dyn TokenStore>,
    items: Arc<dyn WorkItemSource>,
    mapper: Arc<dyn EventMapper>,
    client: Arc<dyn RemoteCalendarClient>,
    oauth: Arc<dyn OAuthTokenClient>,
    run_log: Option<Arc<dyn SyncRunLog>>,
    tokens: TokenManager,
    diff: DiffEngine,
    executor: SyncExecutor,
    locks: DashMap<i64, Arc<Mutex<()>>>,
    in_flight: DashMap<i64, CancellationToken>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn TokenStore>,
        items: Arc<dyn WorkItemSource>,
        mapper: Arc<dyn EventMapper>,
        client: Arc<dyn RemoteCalendarClient>,
        oauth: Arc<dyn OAuthTokenClient>,
    ) -> Self {
        let tokens = TokenManager::new(Arc::clone(&store), Arc::clone(&oauth));
        let executor = SyncExecutor::new(Arc::clone(&client), Arc::clone(&mapper));
        Self {
            store,
            items,
            mapper,
            client,
            oauth,
            run_log: None,
            tokens,
            diff: DiffEngine::new(),
            executor,
            locks: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: SyncOrchestratorConfig) -> Self {
        self.tokens = TokenManager::new(Arc::clone(&self.store), Arc::clone(&self.oauth))
            .with_config(config.token);
        self.executor = SyncExecutor::with_config(
            Arc::clone(&self.client),
            Arc::clone(&self.mapper),
            config.executor,
        );
        self
    }

    /// Record every run in `run_log`. Recording failures never fail a sync.
    pub fn with_run_log(mut self, run_log: Arc<dyn SyncRunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Reconcile every item of the connection's user. Queues behind an
    /// in-flight run for the same connection.
    #[instrument(skip(self))]
    pub async fn sync_all(&self, connection_id: i64) -> Result<SyncResult, SyncError> {
        let lock = self.lock_for(connection_id);
        let _guard = lock.lock().await;
        self.run_locked(connection_id, SyncTrigger::All, Scope::All, None).await
    }

    /// Reconcile a single item. Always queues, never coalesced.
    #[instrument(skip(self))]
    pub async fn sync_one(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> Result<SyncResult, SyncError> {
        let lock = self.lock_for(connection_id);
        let _guard = lock.lock().await;
        self.run_locked(connection_id, SyncTrigger::One, Scope::One { local_id, kind }, None).await
    }

    /// Like [`sync_all`](Self::sync_all), but returns `Ok(None)` instead of
    /// waiting when the connection is already syncing.
    pub async fn try_sync_all(
        &self,
        connection_id: i64,
    ) -> Result<Option<SyncResult>, SyncError> {
        self.try_sync(connection_id, SyncTrigger::Scheduled, None).await
    }

    /// Scheduled fan-out over all connections that do not need
    /// re-authorization, at most `max_concurrency` at a time.
    pub async fn sync_every_connection(
        &self,
        max_concurrency: usize,
    ) -> Result<Vec<ConnectionOutcome>, SyncError> {
        self.sync_connections(max_concurrency, SyncTrigger::Scheduled).await
    }

    /// Fan-out with an explicit trigger label for the run history.
    pub async fn sync_connections(
        &self,
        max_concurrency: usize,
        trigger: SyncTrigger,
    ) -> Result<Vec<ConnectionOutcome>, SyncError> {
        self.sync_connections_until(max_concurrency, trigger, &CancellationToken::new()).await
    }

    /// Fan-out that winds down once `cancel` fires. Connections not yet
    /// started are skipped; in-flight runs stop after their current entry
    /// and are still recorded.
    #[instrument(skip(self, cancel))]
    pub async fn sync_connections_until(
        &self,
        max_concurrency: usize,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConnectionOutcome>, SyncError> {
        let connections = self.store.list_connections().await?;
        let total = connections.len();

        let targets: Vec<i64> = connections
            .into_iter()
            .filter(|connection| {
                if connection.needs_reauth {
                    debug!(connection_id = connection.id, "skipping connection awaiting re-auth");
                }
                !connection.needs_reauth
            })
            .map(|connection| connection.id)
            .collect();

        info!(total, eligible = targets.len(), "syncing calendar connections");

        let outcomes = stream::iter(targets)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|connection_id| async move {
                let outcome = self.try_sync(connection_id, trigger, Some(cancel)).await;
                ConnectionOutcome { connection_id, outcome }
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    /// Current health of a connection. Does not wait for an in-flight run.
    pub async fn get_connection_status(
        &self,
        connection_id: i64,
    ) -> Result<ConnectionStatus, SyncError> {
        let connection = self.load_connection(connection_id).await?;

        let state = if connection.needs_reauth {
            ConnectionState::ReauthRequired
        } else if self.is_syncing(connection_id) {
            ConnectionState::Syncing
        } else {
            ConnectionState::Idle
        };

        Ok(ConnectionStatus {
            connection_id,
            needs_reauth: connection.needs_reauth,
            last_synced_at: connection.last_synced_at,
            state,
        })
    }

    /// Most recent recorded runs, newest first. Empty without a run log.
    pub async fn recent_runs(
        &self,
        connection_id: i64,
        limit: usize,
    ) -> Result<Vec<SyncRun>, SyncError> {
        match &self.run_log {
            Some(run_log) => Ok(run_log.recent_runs(connection_id, limit).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Signal the in-flight run of a connection to stop after its current
    /// entry. Returns whether a run was signalled.
    pub fn cancel(&self, connection_id: i64) -> bool {
        match self.in_flight.get(&connection_id) {
            Some(token) => {
                token.cancel();
                info!(connection_id, "sync cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Remove a connection and all of its mappings, after stopping any
    /// in-flight run. Returns the number of mappings removed.
    ///
    /// Remote events are left in the calendar.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, connection_id: i64) -> Result<usize, SyncError> {
        self.cancel(connection_id);

        let lock = self.lock_for(connection_id);
        let removed = {
            let _guard = lock.lock().await;
            let connection = self.load_connection(connection_id).await?;

            self.tokens.revoke(&connection).await;
            let removed = self.mapper.delete_all_for_connection(connection_id).await?;
            self.store.delete_connection(connection_id).await?;
            removed
        };
        self.locks.remove(&connection_id);

        info!(connection_id, mappings_removed = removed, "calendar connection removed");
        Ok(removed)
    }

    /// Check that the connection's token works by listing one engine-created
    /// event, refreshing once if the calendar API rejects it.
    #[instrument(skip(self))]
    pub async fn verify_connection(&self, connection_id: i64) -> Result<TokenCheck, SyncError> {
        let lock = self.lock_for(connection_id);
        let _guard = lock.lock().await;

        let mut connection = self.load_connection(connection_id).await?;
        let original_token = connection.access_token.clone();
        let query =
            EventQuery { max_results: Some(1), only_app_events: true, ..EventQuery::default() };

        let token = self.tokens.ensure_valid_token(&mut connection).await?;
        let events = match self
            .client
            .list_events(&token, &connection.external_calendar_id, &query)
            .await
        {
            Err(RemoteError::Unauthorized(message)) => {
                warn!(%message, "stored token rejected, attempting refresh");
                self.tokens.invalidate(&mut connection).await?;
                let token = self.tokens.ensure_valid_token(&mut connection).await?;
                self.client.list_events(&token, &connection.external_calendar_id, &query).await
            }
            other => other,
        };

        let sample_events = events?.len();
        let refreshed = connection.access_token != original_token;
        Ok(TokenCheck { connection, refreshed, sample_events })
    }

    async fn try_sync(
        &self,
        connection_id: i64,
        trigger: SyncTrigger,
        parent: Option<&CancellationToken>,
    ) -> Result<Option<SyncResult>, SyncError> {
        let lock = self.lock_for(connection_id);
        let Ok(_guard) = lock.try_lock() else {
            debug!(connection_id, "sync already in progress, coalescing");
            return Ok(None);
        };
        self.run_locked(connection_id, trigger, Scope::All, parent).await.map(Some)
    }

    async fn run_locked(
        &self,
        connection_id: i64,
        trigger: SyncTrigger,
        scope: Scope,
        parent: Option<&CancellationToken>,
    ) -> Result<SyncResult, SyncError> {
        let started_at = Utc::now();
        let cancel = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        self.in_flight.insert(connection_id, cancel.clone());

        let outcome = self.run(connection_id, scope, &cancel).await;

        self.in_flight.remove(&connection_id);
        self.record_run(connection_id, trigger, started_at, &outcome).await;
        outcome
    }

    async fn run(
        &self,
        connection_id: i64,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let mut connection = self.load_connection(connection_id).await?;
        let user_id = connection.user_id;

        let token = match self.tokens.ensure_valid_token(&mut connection).await {
            Ok(token) => token,
            Err(err) => {
                warn!(connection_id, error = %err, "no usable access token");
                return Err(err.into());
            }
        };

        let (items, mappings) = match scope {
            Scope::All => {
                let items = self
                    .items
                    .list_syncable_items(user_id)
                    .await?
                    .into_iter()
                    .filter(|item| item.owner_user_id == user_id)
                    .collect::<Vec<_>>();
                let mappings = self.mapper.all_for_connection(connection_id).await?;
                (items, mappings)
            }
            Scope::One { local_id, kind } => {
                let item = self
                    .items
                    .get_syncable_item(user_id, local_id, kind)
                    .await?
                    .filter(|item| {
                        item.owner_user_id == user_id
                            && item.local_id == local_id
                            && item.kind == kind
                    });
                let mapping = self.mapper.find(connection_id, local_id, kind).await?;
                (item.into_iter().collect(), mapping.into_iter().collect())
            }
        };

        let plan = self.diff.plan(&items, &mappings);
        info!(connection_id, entries = plan.len(), "executing sync plan");

        let result = self.executor.execute(&connection, &token, plan, cancel).await;

        match &result.aborted {
            None => {
                if matches!(scope, Scope::All) {
                    self.mark_synced(connection_id, Utc::now()).await;
                }
                info!(
                    connection_id,
                    created = result.created,
                    updated = result.updated,
                    skipped = result.skipped,
                    deleted = result.deleted,
                    failed = result.failed,
                    "calendar sync completed"
                );
                Ok(result)
            }
            Some(SyncAbort::Unauthorized(message)) => {
                let message = message.clone();
                if let Err(err) = self.tokens.invalidate(&mut connection).await {
                    error!(connection_id, error = %err, "failed to invalidate rejected token");
                }
                Err(SyncError::AuthAborted { message, partial: result })
            }
            Some(SyncAbort::Cancelled) => {
                info!(connection_id, processed = result.processed(), "calendar sync cancelled");
                Ok(result)
            }
        }
    }

    async fn load_connection(&self, connection_id: i64) -> Result<CalendarConnection, SyncError> {
        self.store
            .get_connection(connection_id)
            .await?
            .ok_or(SyncError::ConnectionNotFound(connection_id))
    }

    async fn mark_synced(&self, connection_id: i64, at: DateTime<Utc>) {
        if let Err(err) = self.store.set_last_synced_at(connection_id, at).await {
            error!(connection_id, error = %err, "failed to record last sync time");
        }
    }

    async fn record_run(
        &self,
        connection_id: i64,
        trigger: SyncTrigger,
        started_at: DateTime<Utc>,
        outcome: &Result<SyncResult, SyncError>,
    ) {
        let Some(run_log) = &self.run_log else {
            return;
        };

        let (status, counts, error_message) = match outcome {
            Ok(result) => (SyncRunStatus::from_result(result), Some(result), None),
            Err(SyncError::ConnectionNotFound(_)) => return,
            Err(err @ SyncError::AuthAborted { partial, .. }) => {
                (SyncRunStatus::Aborted, Some(partial), Some(err.to_string()))
            }
            Err(err @ SyncError::Auth(AuthError::ReauthRequired)) => {
                (SyncRunStatus::ReauthRequired, None, Some(err.to_string()))
            }
            Err(err @ SyncError::Auth(AuthError::Transient(_))) => {
                (SyncRunStatus::AuthFailed, None, Some(err.to_string()))
            }
            Err(err @ (SyncError::Storage(_) | SyncError::Remote(_))) => {
                (SyncRunStatus::Failed, None, Some(err.to_string()))
            }
        };

        let empty = SyncResult::default();
        let counts = counts.unwrap_or(&empty);
        let run = SyncRun {
            id: Uuid::now_v7().to_string(),
            connection_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            status,
            created: counts.created,
            updated: counts.updated,
            skipped: counts.skipped,
            deleted: counts.deleted,
            failed: counts.failed,
            error_message,
        };

        if let Err(err) = run_log.record_run(&run).await {
            warn!(connection_id, error = %err, "failed to record sync run");
        }
    }

    fn lock_for(&self, connection_id: i64) -> Arc<Mutex<()>> {
        let entry = self.locks.entry(connection_id).or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    fn is_syncing(&self, connection_id: i64) -> bool {
        self.in_flight.contains_key(&connection_id)
    }
}
