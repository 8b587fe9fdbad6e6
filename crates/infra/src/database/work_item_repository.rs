//! Work-item source over the host application's tables
//!
//! Projects `tasks` (assigned to a user) and `assignments` (visible through
//! `group_members`) into [`SyncableItem`]s. Soft-deleted rows are returned
//! with `is_deleted` set so their events get removed. Rows without a start
//! date, or with dates that do not parse, are not schedulable and are left
//! out. Date-only rows become all-day items.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::WorkItemSource;
use calsync_domain::{ItemKind, Priority, Result as DomainResult, SyncableItem};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::sql::{is_date_only, map_join_error, map_sql_error, parse_host_date};

const TASK_COLUMNS: &str =
    "id, title, description, priority, status, start_date, end_date, deleted_at";
const ASSIGNMENT_COLUMNS: &str =
    "a.id, a.title, a.description, a.start_date, a.end_date, a.deleted_at";

/// SQLite-based work-item source
pub struct SqliteWorkItemSource {
    db: Arc<DbManager>,
}

impl SqliteWorkItemSource {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkItemSource for SqliteWorkItemSource {
    async fn list_syncable_items(&self, user_id: i64) -> DomainResult<Vec<SyncableItem>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncableItem>> {
            let conn = db.get_connection()?;
            // One connection for both reads keeps the snapshot consistent.
            let tx = conn.unchecked_transaction().map_err(map_sql_error)?;
            let mut items = query_tasks(&tx, user_id).map_err(map_sql_error)?;
            items.extend(query_assignments(&tx, user_id).map_err(map_sql_error)?);
            tx.commit().map_err(map_sql_error)?;
            Ok(items)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_syncable_item(
        &self,
        user_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> DomainResult<Option<SyncableItem>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<SyncableItem>> {
            let conn = db.get_connection()?;
            match kind {
                ItemKind::Task => query_task(&conn, user_id, local_id),
                ItemKind::Assignment => query_assignment(&conn, user_id, local_id),
            }
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_tasks(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<SyncableItem>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE assigned_user_id = ?1 AND start_date IS NOT NULL
         ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| map_task_row(row, user_id))?;
    rows.filter_map(Result::transpose).collect()
}

fn query_task(
    conn: &Connection,
    user_id: i64,
    local_id: i64,
) -> rusqlite::Result<Option<SyncableItem>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE id = ?1 AND assigned_user_id = ?2 AND start_date IS NOT NULL"
    );
    conn.query_row(&sql, params![local_id, user_id], |row| map_task_row(row, user_id))
        .optional()
        .map(Option::flatten)
}

fn query_assignments(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<SyncableItem>> {
    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
         JOIN group_members gm ON gm.group_id = a.group_id
         WHERE gm.user_id = ?1 AND a.start_date IS NOT NULL
         ORDER BY a.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| map_assignment_row(row, user_id))?;
    rows.filter_map(Result::transpose).collect()
}

fn query_assignment(
    conn: &Connection,
    user_id: i64,
    local_id: i64,
) -> rusqlite::Result<Option<SyncableItem>> {
    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
         JOIN group_members gm ON gm.group_id = a.group_id
         WHERE a.id = ?1 AND gm.user_id = ?2 AND a.start_date IS NOT NULL"
    );
    conn.query_row(&sql, params![local_id, user_id], |row| map_assignment_row(row, user_id))
        .optional()
        .map(Option::flatten)
}

fn map_task_row(row: &Row<'_>, user_id: i64) -> rusqlite::Result<Option<SyncableItem>> {
    let local_id: i64 = row.get(0)?;
    let title: String = row.get(1)?;
    let free_text: Option<String> = row.get(2)?;
    let priority: Option<String> = row.get(3)?;
    let status: Option<String> = row.get(4)?;
    let start_raw: String = row.get(5)?;
    let end_raw: Option<String> = row.get(6)?;
    let deleted_at: Option<String> = row.get(7)?;

    let Some(schedule) = Schedule::parse(ItemKind::Task, local_id, &start_raw, end_raw.as_deref())
    else {
        return Ok(None);
    };

    let header = format!(
        "Task: {title}\nPriority: {}\nStatus: {}",
        label(priority.as_deref(), "none"),
        label(status.as_deref(), "unknown"),
    );

    Ok(Some(SyncableItem {
        local_id,
        kind: ItemKind::Task,
        description: Some(compose_description(header, free_text.as_deref())),
        title,
        start_at: schedule.start_at,
        end_at: schedule.end_at,
        all_day: schedule.all_day,
        owner_user_id: user_id,
        is_deleted: deleted_at.is_some(),
        priority: priority.as_deref().and_then(Priority::parse),
        status: status.filter(|value| !value.trim().is_empty()),
    }))
}

fn map_assignment_row(row: &Row<'_>, user_id: i64) -> rusqlite::Result<Option<SyncableItem>> {
    let local_id: i64 = row.get(0)?;
    let title: String = row.get(1)?;
    let free_text: Option<String> = row.get(2)?;
    let start_raw: String = row.get(3)?;
    let end_raw: Option<String> = row.get(4)?;
    let deleted_at: Option<String> = row.get(5)?;

    let Some(schedule) =
        Schedule::parse(ItemKind::Assignment, local_id, &start_raw, end_raw.as_deref())
    else {
        return Ok(None);
    };

    let header = format!("Assignment: {title}");

    Ok(Some(SyncableItem {
        local_id,
        kind: ItemKind::Assignment,
        description: Some(compose_description(header, free_text.as_deref())),
        title,
        start_at: schedule.start_at,
        end_at: schedule.end_at,
        all_day: schedule.all_day,
        owner_user_id: user_id,
        is_deleted: deleted_at.is_some(),
        priority: None,
        status: None,
    }))
}

/// Start and end of a work item as read from its host date columns.
struct Schedule {
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    all_day: bool,
}

impl Schedule {
    /// `None` when the start date does not parse. An unparseable end date
    /// falls back to the start.
    fn parse(
        kind: ItemKind,
        local_id: i64,
        start_raw: &str,
        end_raw: Option<&str>,
    ) -> Option<Self> {
        let start_at = match parse_host_date(0, start_raw) {
            Ok(at) => at,
            Err(err) => {
                warn!(%kind, local_id, error = %err, "skipping work item with unreadable date");
                return None;
            }
        };

        let end_raw = end_raw.filter(|value| !value.trim().is_empty());
        let end_at = match end_raw.map(|value| parse_host_date(0, value)) {
            Some(Ok(at)) => at,
            Some(Err(err)) => {
                warn!(%kind, local_id, error = %err, "unreadable end date, using start date");
                start_at
            }
            None => start_at,
        };
        let all_day = is_date_only(start_raw) && end_raw.map_or(true, is_date_only);

        Some(Self { start_at, end_at, all_day })
    }
}

fn label<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(fallback)
}

fn compose_description(header: String, free_text: Option<&str>) -> String {
    match free_text.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => format!("{header}\n\n{text}"),
        None => header,
    }
}

// ============================================================================
// Tests
// ============================================================================
