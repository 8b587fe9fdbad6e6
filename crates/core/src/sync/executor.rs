//! Plan execution against the remote calendar

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use calsync_common::resilience::{RetryConfig, RetryError, RetryExecutor};
use calsync_domain::constants::{DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_RETRIES};
use calsync_domain::{
    AccessToken, CalSyncError, CalendarConnection, EventPayload, ItemKey, PlanEntry, RemoteError,
    SyncAbort, SyncAction, SyncErrorKind, SyncResult, SyncableItem,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::{EventMapper, RemoteCalendarClient};
use crate::retry::{remote_retry_config, RemoteRetryPolicy};

/// Tuning for [`SyncExecutor`]
#[derive(Debug, Clone)]
pub struct SyncExecutorConfig {
    /// Extra attempts per remote call on transient or rate-limit errors
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// IANA zone written into event start and end
    pub time_zone: String,
}

impl Default for SyncExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            time_zone: "UTC".to_string(),
        }
    }
}

enum Applied {
    Created,
    Updated,
    Deleted,
    Skipped,
}

enum EntryError {
    Remote(RemoteError),
    Storage(CalSyncError),
}

impl From<RemoteError> for EntryError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

impl From<CalSyncError> for EntryError {
    fn from(err: CalSyncError) -> Self {
        Self::Storage(err)
    }
}

/// Applies a sync plan one entry at a time.
///
/// Item failures are recorded and skipped over. Only a rejected access
/// token or cancellation stops the run early.
pub struct SyncExecutor {
    client: Arc<dyn RemoteCalendarClient>,
    mapper: Arc<dyn EventMapper>,
    retry: RetryConfig,
    time_zone: String,
}

impl SyncExecutor {
    pub fn new(client: Arc<dyn RemoteCalendarClient>, mapper: Arc<dyn EventMapper>) -> Self {
        Self::with_config(client, mapper, SyncExecutorConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn RemoteCalendarClient>,
        mapper: Arc<dyn EventMapper>,
        config: SyncExecutorConfig,
    ) -> Self {
        Self {
            client,
            mapper,
            retry: remote_retry_config(config.max_retries, config.initial_backoff),
            time_zone: config.time_zone,
        }
    }

    #[instrument(skip_all, fields(connection_id = connection.id, entries = plan.len()))]
    pub async fn execute(
        &self,
        connection: &CalendarConnection,
        token: &AccessToken,
        plan: Vec<PlanEntry>,
        cancel: &CancellationToken,
    ) -> SyncResult {
        let mut result = SyncResult::default();

        for entry in plan {
            if cancel.is_cancelled() {
                info!(processed = result.processed(), "sync cancelled");
                result.aborted = Some(SyncAbort::Cancelled);
                break;
            }

            let key = entry.key();
            match self.apply(connection, token, key, entry.action).await {
                Ok(Applied::Created) => result.created += 1,
                Ok(Applied::Updated) => result.updated += 1,
                Ok(Applied::Deleted) => result.deleted += 1,
                Ok(Applied::Skipped) => result.skipped += 1,
                Err(EntryError::Remote(RemoteError::Unauthorized(message))) => {
                    warn!(item = %key, %message, "access token rejected, aborting sync");
                    result.aborted = Some(SyncAbort::Unauthorized(message));
                    break;
                }
                Err(EntryError::Remote(err)) => {
                    warn!(item = %key, error = %err, "failed to sync item");
                    result.record_failure(key, failure_kind(&err), err.to_string());
                }
                Err(EntryError::Storage(err)) => {
                    warn!(item = %key, error = %err, "failed to store event mapping");
                    result.record_failure(key, SyncErrorKind::Storage, err.to_string());
                }
            }
        }

        debug!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            deleted = result.deleted,
            failed = result.failed,
            "plan executed"
        );
        result
    }

    async fn apply(
        &self,
        connection: &CalendarConnection,
        token: &AccessToken,
        key: ItemKey,
        action: SyncAction,
    ) -> Result<Applied, EntryError> {
        let calendar_id = connection.external_calendar_id.as_str();

        match action {
            SyncAction::Skip => Ok(Applied::Skipped),
            SyncAction::Create { item, fingerprint } => {
                self.create(connection.id, token, calendar_id, &item, &fingerprint).await?;
                Ok(Applied::Created)
            }
            SyncAction::Update { item, fingerprint, remote_event_id } => {
                let payload = self.payload(&item);
                let updated = self
                    .with_retry(|| {
                        self.client.update_event(token, calendar_id, &remote_event_id, &payload)
                    })
                    .await;

                match updated {
                    Ok(()) => {
                        self.mapper
                            .upsert(
                                connection.id,
                                key.local_id,
                                key.kind,
                                &remote_event_id,
                                &fingerprint,
                            )
                            .await?;
                        Ok(Applied::Updated)
                    }
                    Err(RemoteError::NotFound(_)) => {
                        debug!(item = %key, "remote event vanished, recreating");
                        self.create(connection.id, token, calendar_id, &item, &fingerprint).await?;
                        Ok(Applied::Created)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            SyncAction::Delete { remote_event_id } => {
                let deleted = self
                    .with_retry(|| self.client.delete_event(token, calendar_id, &remote_event_id))
                    .await;

                match deleted {
                    Ok(()) | Err(RemoteError::NotFound(_)) => {
                        self.mapper.delete(connection.id, key.local_id, key.kind).await?;
                        Ok(Applied::Deleted)
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn create(
        &self,
        connection_id: i64,
        token: &AccessToken,
        calendar_id: &str,
        item: &SyncableItem,
        fingerprint: &str,
    ) -> Result<(), EntryError> {
        let payload = self.payload(item);
        let remote_event_id = self
            .with_retry(|| self.client.create_event(token, calendar_id, &payload))
            .await?;
        self.mapper
            .upsert(connection_id, item.local_id, item.kind, &remote_event_id, fingerprint)
            .await?;
        Ok(())
    }

    fn payload(&self, item: &SyncableItem) -> EventPayload {
        EventPayload::for_item(item, &self.time_zone)
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        RetryExecutor::new(self.retry.clone(), RemoteRetryPolicy)
            .execute(operation)
            .await
            .map_err(|err| match err {
                RetryError::AttemptsExhausted { last, .. } => last,
                RetryError::NonRetryable { error } => error,
                RetryError::InvalidConfiguration { message } => {
                    RemoteError::Permanent { status: None, message }
                }
            })
    }
}

fn failure_kind(error: &RemoteError) -> SyncErrorKind {
    match error {
        RemoteError::NotFound(_) => SyncErrorKind::NotFound,
        RemoteError::RateLimited { .. } => SyncErrorKind::RateLimited,
        RemoteError::Transient(_) => SyncErrorKind::Transient,
        RemoteError::Unauthorized(_) | RemoteError::Permanent { .. } => SyncErrorKind::Permanent,
    }
}
