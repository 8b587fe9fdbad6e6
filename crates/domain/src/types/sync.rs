//! Sync plans, results and run history

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemKey, ItemKind, SyncableItem};

/// What to do with one item during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No remote event exists yet.
    Create { item: SyncableItem, fingerprint: String },
    /// The remote event exists but its content drifted.
    Update { item: SyncableItem, fingerprint: String, remote_event_id: String },
    /// The remote event is current.
    Skip,
    /// The item disappeared or was deleted locally.
    Delete { remote_event_id: String },
}

/// Discriminant of [`SyncAction`], handy for assertions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Skip,
    Delete,
}

impl SyncAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Skip => ActionKind::Skip,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }
}

/// One step of a sync plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub local_id: i64,
    pub kind: ItemKind,
    pub action: SyncAction,
}

impl PlanEntry {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.local_id, self.kind)
    }
}

/// Classification of a per-item failure recorded in a [`SyncResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    NotFound,
    RateLimited,
    Transient,
    Permanent,
    Storage,
}

impl SyncErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single item that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub local_id: i64,
    pub kind: ItemKind,
    pub error_kind: SyncErrorKind,
    pub message: String,
}

/// Why a run stopped before reaching the end of its plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum SyncAbort {
    /// The calendar API rejected the access token mid-run.
    Unauthorized(String),
    Cancelled,
}

/// Outcome of executing a sync plan.
///
/// Entries left unprocessed by an abort are counted nowhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<SyncAbort>,
}

impl SyncResult {
    pub fn record_failure(
        &mut self,
        key: ItemKey,
        error_kind: SyncErrorKind,
        message: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(SyncFailure {
            local_id: key.local_id,
            kind: key.kind,
            error_kind,
            message: message.into(),
        });
    }

    /// Number of plan entries that reached a final outcome.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.deleted + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.aborted, Some(SyncAbort::Cancelled))
    }

    pub fn was_unauthorized(&self) -> bool {
        matches!(self.aborted, Some(SyncAbort::Unauthorized(_)))
    }

    /// Fold another result into this one (used when aggregating batches).
    pub fn absorb(&mut self, other: SyncResult) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        if self.aborted.is_none() {
            self.aborted = other.aborted;
        }
    }
}

/// What triggered an orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    All,
    One,
    Scheduled,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::One => "one",
            Self::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "one" => Some(Self::One),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// Final status of an orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Success,
    /// Completed with at least one failed item.
    Partial,
    ReauthRequired,
    /// Token refresh failed transiently; nothing was attempted.
    AuthFailed,
    /// The calendar API rejected the token mid-run.
    Aborted,
    Cancelled,
    /// Storage or collaborator failure before execution.
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::ReauthRequired => "reauth_required",
            Self::AuthFailed => "auth_failed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "reauth_required" => Some(Self::ReauthRequired),
            "auth_failed" => Some(Self::AuthFailed),
            "aborted" => Some(Self::Aborted),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Status for a run whose plan was executed.
    pub fn from_result(result: &SyncResult) -> Self {
        match &result.aborted {
            Some(SyncAbort::Unauthorized(_)) => Self::Aborted,
            Some(SyncAbort::Cancelled) => Self::Cancelled,
            None if result.failed > 0 => Self::Partial,
            None => Self::Success,
        }
    }
}

/// Audit record of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    pub connection_id: i64,
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SyncRunStatus,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub error_message: Option<String>,
}
