//! Provider-neutral calendar event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemKey, ItemKind, Priority, SyncableItem};
use crate::constants::{colors, APP_SOURCE};

/// Event body written to the remote calendar for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Render as dates rather than instants.
    pub all_day: bool,
    pub time_zone: String,
    pub color_id: String,
    /// Back-reference stored in the event's private properties.
    pub source: ItemKey,
}

impl EventPayload {
    /// Build the payload for `item`, rendering times in `time_zone`.
    pub fn for_item(item: &SyncableItem, time_zone: &str) -> Self {
        Self {
            summary: item.title.clone(),
            description: item.description.clone(),
            start: item.start_at,
            end: item.end_at,
            all_day: item.all_day,
            time_zone: time_zone.to_string(),
            color_id: color_for(item.kind, item.priority).to_string(),
            source: item.key(),
        }
    }

    pub fn app_source(&self) -> &'static str {
        APP_SOURCE
    }
}

fn color_for(kind: ItemKind, priority: Option<Priority>) -> &'static str {
    match (kind, priority) {
        (ItemKind::Assignment, _) => colors::ASSIGNMENT,
        (ItemKind::Task, Some(Priority::High)) => colors::HIGH_PRIORITY,
        (ItemKind::Task, Some(Priority::Medium)) => colors::MEDIUM_PRIORITY,
        (ItemKind::Task, Some(Priority::Low)) => colors::LOW_PRIORITY,
        (ItemKind::Task, None) => colors::NO_PRIORITY,
    }
}

/// Event as listed back from the remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    pub summary: Option<String>,
    /// `dateTime` or `date` as returned by the provider.
    pub start: Option<String>,
    pub end: Option<String>,
    pub app_source: Option<String>,
    /// Work item the event was created for, when it carries our markers.
    pub local_ref: Option<ItemKey>,
}

/// Filter for listing remote events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
    /// Only return events created by this engine.
    pub only_app_events: bool,
}
