//! Port interfaces for calendar sync

use async_trait::async_trait;
use calsync_domain::{
    AccessToken, EventMapping, EventPayload, EventQuery, ItemKind, RemoteError, RemoteEvent,
    Result, SyncRun, SyncableItem,
};

/// Read-only view of the host application's tasks and assignments
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    /// Snapshot of every item relevant to a user, including soft-deleted
    /// ones so they can be removed from the calendar
    async fn list_syncable_items(&self, user_id: i64) -> Result<Vec<SyncableItem>>;

    /// Single item as seen by `user_id`, or `None` if it does not exist
    async fn get_syncable_item(
        &self,
        user_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> Result<Option<SyncableItem>>;
}

/// Storage for local item to remote event mappings
#[async_trait]
pub trait EventMapper: Send + Sync {
    async fn find(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> Result<Option<EventMapping>>;

    /// Insert or replace the mapping for `(connection_id, local_id, kind)`
    async fn upsert(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
        remote_event_id: &str,
        fingerprint: &str,
    ) -> Result<()>;

    async fn delete(&self, connection_id: i64, local_id: i64, kind: ItemKind) -> Result<()>;

    async fn all_for_connection(&self, connection_id: i64) -> Result<Vec<EventMapping>>;

    /// Drop every mapping of a connection, returning how many were removed
    async fn delete_all_for_connection(&self, connection_id: i64) -> Result<usize>;
}

/// Calendar provider API
#[async_trait]
pub trait RemoteCalendarClient: Send + Sync {
    /// Create an event and return its provider id
    async fn create_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        event: &EventPayload,
    ) -> std::result::Result<String, RemoteError>;

    async fn update_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        remote_event_id: &str,
        event: &EventPayload,
    ) -> std::result::Result<(), RemoteError>;

    async fn delete_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> std::result::Result<(), RemoteError>;

    async fn list_events(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        query: &EventQuery,
    ) -> std::result::Result<Vec<RemoteEvent>, RemoteError>;
}

/// History of orchestrated sync runs
#[async_trait]
pub trait SyncRunLog: Send + Sync {
    async fn record_run(&self, run: &SyncRun) -> Result<()>;

    /// Most recent runs first
    async fn recent_runs(&self, connection_id: i64, limit: usize) -> Result<Vec<SyncRun>>;
}
