//! Sync run history repository

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::SyncRunLog;
use calsync_domain::{Result as DomainResult, SyncRun, SyncRunStatus, SyncTrigger};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use super::sql::{from_millis, map_join_error, map_sql_error, to_millis};

/// SQLite-based sync run log
pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRunLog for SqliteSyncRunRepository {
    async fn record_run(&self, run: &SyncRun) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let run = run.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_run(&conn, &run).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recent_runs(&self, connection_id: i64, limit: usize) -> DomainResult<Vec<SyncRun>> {
        let db = Arc::clone(&self.db);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncRun>> {
            let conn = db.get_connection()?;
            query_recent_runs(&conn, connection_id, limit).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_run(conn: &Connection, run: &SyncRun) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sync_runs
             (id, connection_id, trigger_kind, started_at, finished_at, status,
              created_count, updated_count, skipped_count, deleted_count, failed_count,
              error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &run.id,
            run.connection_id,
            run.trigger.as_str(),
            to_millis(run.started_at),
            to_millis(run.finished_at),
            run.status.as_str(),
            count(run.created),
            count(run.updated),
            count(run.skipped),
            count(run.deleted),
            count(run.failed),
            &run.error_message,
        ],
    )?;
    Ok(())
}

fn query_recent_runs(
    conn: &Connection,
    connection_id: i64,
    limit: i64,
) -> rusqlite::Result<Vec<SyncRun>> {
    let sql = "SELECT id, connection_id, trigger_kind, started_at, finished_at, status,
                      created_count, updated_count, skipped_count, deleted_count, failed_count,
                      error_message
               FROM sync_runs WHERE connection_id = ?1
               ORDER BY started_at DESC, id DESC
               LIMIT ?2";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![connection_id, limit], map_run_row)?;
    rows.collect()
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let trigger: String = row.get(2)?;
    let status: String = row.get(5)?;

    Ok(SyncRun {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        trigger: SyncTrigger::parse(&trigger).ok_or_else(|| invalid_text(2, &trigger))?,
        started_at: from_millis(3, row.get(3)?)?,
        finished_at: from_millis(4, row.get(4)?)?,
        status: SyncRunStatus::parse(&status).ok_or_else(|| invalid_text(5, &status))?,
        created: row.get::<_, u32>(6)? as usize,
        updated: row.get::<_, u32>(7)? as usize,
        skipped: row.get::<_, u32>(8)? as usize,
        deleted: row.get::<_, u32>(9)? as usize,
        failed: row.get::<_, u32>(10)? as usize,
        error_message: row.get(11)?,
    })
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn invalid_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unexpected value: {value}").into(),
    )
}

// ============================================================================
// Tests
// ============================================================================
