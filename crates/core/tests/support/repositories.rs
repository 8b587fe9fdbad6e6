//! In-memory mocks for the storage-side ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use calsync_core::{EventMapper, SyncRunLog, WorkItemSource};
use calsync_domain::{
    CalSyncError, EventMapping, ItemKey, ItemKind, Result as DomainResult, SyncRun, SyncableItem,
};
use chrono::Utc;

/// Work-item source backed by a vector.
///
/// Listing returns every stored item regardless of owner so tests can check
/// that the orchestrator drops foreign items itself.
#[derive(Default)]
pub struct InMemoryWorkItemSource {
    items: Mutex<Vec<SyncableItem>>,
}

impl InMemoryWorkItemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, items: Vec<SyncableItem>) {
        *self.items.lock().unwrap() = items;
    }

    /// Replace the item with the same key, or append it.
    pub fn put(&self, item: SyncableItem) {
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|existing| existing.key() == item.key()) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub fn remove(&self, key: ItemKey) {
        self.items.lock().unwrap().retain(|item| item.key() != key);
    }
}

#[async_trait]
impl WorkItemSource for InMemoryWorkItemSource {
    async fn list_syncable_items(&self, _user_id: i64) -> DomainResult<Vec<SyncableItem>> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn get_syncable_item(
        &self,
        _user_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> DomainResult<Option<SyncableItem>> {
        let key = ItemKey::new(local_id, kind);
        Ok(self.items.lock().unwrap().iter().find(|item| item.key() == key).cloned())
    }
}

/// In-memory mock for `EventMapper`.
#[derive(Default)]
pub struct InMemoryEventMapper {
    mappings: Mutex<HashMap<(i64, ItemKey), EventMapping>>,
    fail_upserts: AtomicBool,
}

impl InMemoryEventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mapping: EventMapping) {
        self.mappings.lock().unwrap().insert((mapping.connection_id, mapping.key()), mapping);
    }

    pub fn get(&self, connection_id: i64, key: ItemKey) -> Option<EventMapping> {
        self.mappings.lock().unwrap().get(&(connection_id, key)).cloned()
    }

    pub fn count(&self) -> usize {
        self.mappings.lock().unwrap().len()
    }

    /// Make every `upsert` fail, as if the database were unavailable.
    pub fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventMapper for InMemoryEventMapper {
    async fn find(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> DomainResult<Option<EventMapping>> {
        Ok(self.get(connection_id, ItemKey::new(local_id, kind)))
    }

    async fn upsert(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
        remote_event_id: &str,
        fingerprint: &str,
    ) -> DomainResult<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(CalSyncError::Database("database is locked".into()));
        }
        self.insert(EventMapping {
            connection_id,
            local_id,
            kind,
            remote_event_id: remote_event_id.to_string(),
            content_fingerprint: fingerprint.to_string(),
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete(&self, connection_id: i64, local_id: i64, kind: ItemKind) -> DomainResult<()> {
        self.mappings.lock().unwrap().remove(&(connection_id, ItemKey::new(local_id, kind)));
        Ok(())
    }

    async fn all_for_connection(&self, connection_id: i64) -> DomainResult<Vec<EventMapping>> {
        let mut mappings: Vec<_> = self
            .mappings
            .lock()
            .unwrap()
            .values()
            .filter(|mapping| mapping.connection_id == connection_id)
            .cloned()
            .collect();
        mappings.sort_by_key(EventMapping::key);
        Ok(mappings)
    }

    async fn delete_all_for_connection(&self, connection_id: i64) -> DomainResult<usize> {
        let mut mappings = self.mappings.lock().unwrap();
        let before = mappings.len();
        mappings.retain(|(owner, _), _| *owner != connection_id);
        Ok(before - mappings.len())
    }
}

/// Run log that keeps everything in memory.
#[derive(Default)]
pub struct InMemorySyncRunLog {
    runs: Mutex<Vec<SyncRun>>,
}

impl InMemorySyncRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncRunLog for InMemorySyncRunLog {
    async fn record_run(&self, run: &SyncRun) -> DomainResult<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn recent_runs(&self, connection_id: i64, limit: usize) -> DomainResult<Vec<SyncRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|run| run.connection_id == connection_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
