use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use calsync_core::RemoteCalendarClient;
use calsync_domain::{AccessToken, EventPayload, EventQuery, ItemKey, RemoteError, RemoteEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Create,
    Update,
    Delete,
    List,
}

/// One request observed by [`MockCalendarClient`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub source: Option<ItemKey>,
    pub remote_event_id: Option<String>,
    pub token: String,
}

struct ScriptedFailure {
    kind: CallKind,
    source: Option<ItemKey>,
    error: RemoteError,
    remaining: usize,
}

/// In-memory calendar.
///
/// Keeps created events, records every request and replays scripted
/// failures. Updating or deleting an unknown event id yields `NotFound`,
/// which mirrors an event removed by the user in the calendar UI.
#[derive(Default)]
pub struct MockCalendarClient {
    events: Mutex<HashMap<String, EventPayload>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<Vec<ScriptedFailure>>,
    next_id: AtomicU64,
    accepted_token: Mutex<Option<String>>,
    latency: Option<Duration>,
}

impl MockCalendarClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request, for tests that need a run to stay in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `times` calls of `kind` (for `source`, if given).
    pub fn fail(&self, kind: CallKind, source: Option<ItemKey>, error: RemoteError, times: usize) {
        self.failures.lock().unwrap().push(ScriptedFailure {
            kind,
            source,
            error,
            remaining: times,
        });
    }

    /// Reject every other bearer token with 401.
    pub fn only_accept_token(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    /// Remove an event behind the engine's back.
    pub fn remove_event(&self, remote_event_id: &str) {
        self.events.lock().unwrap().remove(remote_event_id);
    }

    pub fn event(&self, remote_event_id: &str) -> Option<EventPayload> {
        self.events.lock().unwrap().get(remote_event_id).cloned()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|call| call.kind == kind).collect()
    }

    async fn begin(
        &self,
        kind: CallKind,
        token: &AccessToken,
        source: Option<ItemKey>,
        remote_event_id: Option<&str>,
    ) -> Result<(), RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            source,
            remote_event_id: remote_event_id.map(str::to_string),
            token: token.secret().to_string(),
        });

        if let Some(accepted) = self.accepted_token.lock().unwrap().as_deref() {
            if accepted != token.secret() {
                return Err(RemoteError::Unauthorized("invalid credentials".into()));
            }
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(failure) = failures.iter_mut().find(|failure| {
            failure.remaining > 0
                && failure.kind == kind
                && (failure.source.is_none() || failure.source == source)
        }) {
            failure.remaining -= 1;
            return Err(failure.error.clone());
        }
        Ok(())
    }

    fn source_of(&self, remote_event_id: &str) -> Option<ItemKey> {
        self.events.lock().unwrap().get(remote_event_id).map(|event| event.source)
    }
}

#[async_trait]
impl RemoteCalendarClient for MockCalendarClient {
    async fn create_event(
        &self,
        token: &AccessToken,
        _calendar_id: &str,
        event: &EventPayload,
    ) -> Result<String, RemoteError> {
        self.begin(CallKind::Create, token, Some(event.source), None).await?;
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.events.lock().unwrap().insert(id.clone(), event.clone());
        Ok(id)
    }

    async fn update_event(
        &self,
        token: &AccessToken,
        _calendar_id: &str,
        remote_event_id: &str,
        event: &EventPayload,
    ) -> Result<(), RemoteError> {
        self.begin(CallKind::Update, token, Some(event.source), Some(remote_event_id)).await?;
        let mut events = self.events.lock().unwrap();
        match events.get_mut(remote_event_id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => Err(RemoteError::NotFound(remote_event_id.to_string())),
        }
    }

    async fn delete_event(
        &self,
        token: &AccessToken,
        _calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<(), RemoteError> {
        let source = self.source_of(remote_event_id);
        self.begin(CallKind::Delete, token, source, Some(remote_event_id)).await?;
        match self.events.lock().unwrap().remove(remote_event_id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(remote_event_id.to_string())),
        }
    }

    async fn list_events(
        &self,
        token: &AccessToken,
        _calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<RemoteEvent>, RemoteError> {
        self.begin(CallKind::List, token, None, None).await?;
        let limit = query.max_results.map_or(usize::MAX, |max| max as usize);
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|(id, event)| RemoteEvent {
                id: id.clone(),
                summary: Some(event.summary.clone()),
                start: Some(event.start.to_rfc3339()),
                end: Some(event.end.to_rfc3339()),
                app_source: Some(event.app_source().to_string()),
                local_ref: Some(event.source),
            })
            .collect())
    }
}
