//! Sync planning
//!
//! Pure function of the current items and the stored mappings. Planning
//! never touches the network or storage, so it can be rerun freely.

use std::collections::HashMap;

use calsync_domain::{EventMapping, ItemKey, PlanEntry, SyncAction, SyncableItem};
use tracing::debug;

use super::fingerprint::fingerprint;

/// Computes the create/update/skip/delete plan for one connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Plan the actions that bring the remote calendar in line with `items`.
    ///
    /// Deletes come first, ordered by `(kind, local_id)`; the remaining
    /// entries follow the order of `items`. When `items` repeats a key, the
    /// last occurrence wins but keeps the first occurrence's position.
    pub fn plan(&self, items: &[SyncableItem], mappings: &[EventMapping]) -> Vec<PlanEntry> {
        let mut order: Vec<ItemKey> = Vec::with_capacity(items.len());
        let mut latest: HashMap<ItemKey, &SyncableItem> = HashMap::with_capacity(items.len());
        for item in items {
            if latest.insert(item.key(), item).is_none() {
                order.push(item.key());
            }
        }

        let by_key: HashMap<ItemKey, &EventMapping> =
            mappings.iter().map(|mapping| (mapping.key(), mapping)).collect();

        let mut deletes: Vec<(ItemKey, &EventMapping)> = by_key
            .iter()
            .filter(|(key, _)| !latest.get(*key).is_some_and(|item| item.is_live()))
            .map(|(key, mapping)| (*key, *mapping))
            .collect();
        deletes.sort_by_key(|(key, _)| *key);

        let mut plan: Vec<PlanEntry> = deletes
            .into_iter()
            .map(|(key, mapping)| PlanEntry {
                local_id: key.local_id,
                kind: key.kind,
                action: SyncAction::Delete { remote_event_id: mapping.remote_event_id.clone() },
            })
            .collect();

        for key in order {
            let Some(item) = latest.get(&key).copied().filter(|item| item.is_live()) else {
                continue;
            };

            let current = fingerprint(item);
            let action = match by_key.get(&key) {
                None => SyncAction::Create { item: item.clone(), fingerprint: current },
                Some(mapping) if mapping.content_fingerprint == current => SyncAction::Skip,
                Some(mapping) => SyncAction::Update {
                    item: item.clone(),
                    fingerprint: current,
                    remote_event_id: mapping.remote_event_id.clone(),
                },
            };
            plan.push(PlanEntry { local_id: key.local_id, kind: key.kind, action });
        }

        debug!(
            items = items.len(),
            mappings = mappings.len(),
            entries = plan.len(),
            "sync plan computed"
        );
        plan
    }
}
