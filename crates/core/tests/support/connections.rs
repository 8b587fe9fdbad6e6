use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use calsync_core::{OAuthTokenClient, TokenStore};
use calsync_domain::{
    CalSyncError, CalendarConnection, NewConnection, RefreshError, Result as DomainResult,
    TokenGrant,
};
use chrono::{DateTime, Utc};

/// In-memory mock for `TokenStore`.
#[derive(Default)]
pub struct InMemoryTokenStore {
    connections: Mutex<HashMap<i64, CalendarConnection>>,
    next_id: AtomicI64,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self { next_id: AtomicI64::new(100), ..Self::default() }
    }

    pub fn insert(&self, connection: CalendarConnection) {
        self.connections.lock().unwrap().insert(connection.id, connection);
    }

    pub fn connection(&self, id: i64) -> Option<CalendarConnection> {
        self.connections.lock().unwrap().get(&id).cloned()
    }

    /// Make every `save_credentials` call fail.
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_connection(&self, connection_id: i64) -> DomainResult<Option<CalendarConnection>> {
        Ok(self.connection(connection_id))
    }

    async fn get_connection_for_user(
        &self,
        user_id: i64,
    ) -> DomainResult<Option<CalendarConnection>> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .values()
            .find(|connection| connection.user_id == user_id)
            .cloned())
    }

    async fn list_connections(&self) -> DomainResult<Vec<CalendarConnection>> {
        let mut connections: Vec<_> = self.connections.lock().unwrap().values().cloned().collect();
        connections.sort_by_key(|connection| connection.id);
        Ok(connections)
    }

    async fn upsert_connection(
        &self,
        connection: &NewConnection,
    ) -> DomainResult<CalendarConnection> {
        let now = Utc::now();
        let mut connections = self.connections.lock().unwrap();
        let existing = connections.values().find(|c| c.user_id == connection.user_id).cloned();
        let stored = CalendarConnection {
            id: existing
                .as_ref()
                .map_or_else(|| self.next_id.fetch_add(1, Ordering::SeqCst), |c| c.id),
            user_id: connection.user_id,
            external_calendar_id: connection.external_calendar_id.clone(),
            access_token: connection.access_token.clone(),
            refresh_token: connection.refresh_token.clone(),
            token_expires_at: connection.token_expires_at,
            last_synced_at: existing.as_ref().and_then(|c| c.last_synced_at),
            needs_reauth: false,
            created_at: existing.as_ref().map_or(now, |c| c.created_at),
            updated_at: now,
        };
        connections.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_credentials(&self, connection: &CalendarConnection) -> DomainResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CalSyncError::Database("disk I/O error".into()));
        }
        let mut connections = self.connections.lock().unwrap();
        let stored = connections
            .get_mut(&connection.id)
            .ok_or_else(|| CalSyncError::NotFound(format!("connection {}", connection.id)))?;
        stored.access_token = connection.access_token.clone();
        stored.refresh_token = connection.refresh_token.clone();
        stored.token_expires_at = connection.token_expires_at;
        stored.needs_reauth = connection.needs_reauth;
        stored.updated_at = connection.updated_at;
        Ok(())
    }

    async fn set_last_synced_at(&self, connection_id: i64, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(stored) = self.connections.lock().unwrap().get_mut(&connection_id) {
            stored.last_synced_at = Some(at);
        }
        Ok(())
    }

    async fn delete_connection(&self, connection_id: i64) -> DomainResult<()> {
        self.connections.lock().unwrap().remove(&connection_id);
        Ok(())
    }
}

/// Scripted mock for `OAuthTokenClient`.
///
/// Replays queued refresh responses in order; an empty queue answers with a
/// transient failure.
#[derive(Default)]
pub struct MockOAuthClient {
    responses: Mutex<VecDeque<Result<TokenGrant, RefreshError>>>,
    refresh_calls: AtomicUsize,
    revoked: Mutex<Vec<String>>,
}

impl MockOAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<TokenGrant, RefreshError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_grant(&self, access_token: &str, expires_in: i64) {
        self.push(Ok(TokenGrant {
            access_token: access_token.to_string(),
            expires_in,
            refresh_token: None,
        }));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl OAuthTokenClient for MockOAuthClient {
    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::Transient("no scripted response".into())))
    }

    async fn revoke_token(&self, token: &str) -> Result<(), RefreshError> {
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }
}
