//! Local item to remote event mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemKey, ItemKind};

/// Persistent link between a local work item and the remote event created
/// for it.
///
/// At most one mapping exists per `(connection_id, local_id, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMapping {
    pub connection_id: i64,
    pub local_id: i64,
    pub kind: ItemKind,
    pub remote_event_id: String,
    /// Content hash of the item as last written to the remote calendar.
    pub content_fingerprint: String,
    pub updated_at: DateTime<Utc>,
}

impl EventMapping {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.local_id, self.kind)
    }
}
