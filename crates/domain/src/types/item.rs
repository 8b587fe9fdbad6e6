//! Work-item projections consumed by the sync engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CalSyncError;

/// Kind of local work item an event is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Assignment,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Assignment => "assignment",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = CalSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "assignment" => Ok(Self::Assignment),
            other => Err(CalSyncError::InvalidInput(format!("unknown item kind: {other}"))),
        }
    }
}

/// Identity of a work item within one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub local_id: i64,
}

impl ItemKey {
    pub fn new(local_id: i64, kind: ItemKind) -> Self {
        Self { kind, local_id }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.local_id)
    }
}

/// Task priority, used to pick the event color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Lenient parse; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Read-only projection of a task or assignment relevant to one user.
///
/// Produced fresh on every pass by the work-item source and never persisted
/// by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncableItem {
    pub local_id: i64,
    pub kind: ItemKind,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Host dates carried no time of day; `end_at` is the last day, inclusive.
    pub all_day: bool,
    pub owner_user_id: i64,
    /// Soft-deleted, or no longer visible to the owner.
    pub is_deleted: bool,
    pub priority: Option<Priority>,
    pub status: Option<String>,
}

impl SyncableItem {
    pub fn new(
        local_id: i64,
        kind: ItemKind,
        title: impl Into<String>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        owner_user_id: i64,
    ) -> Self {
        Self {
            local_id,
            kind,
            title: title.into(),
            description: None,
            start_at,
            end_at,
            all_day: false,
            owner_user_id,
            is_deleted: false,
            priority: None,
            status: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn as_all_day(mut self) -> Self {
        self.all_day = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.local_id, self.kind)
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}
