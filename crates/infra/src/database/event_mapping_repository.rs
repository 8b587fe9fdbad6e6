//! Event mapping repository
//!
//! Links local work items to the remote events created for them, keyed by
//! `(connection_id, local_id, kind)`.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::EventMapper;
use calsync_domain::{EventMapping, ItemKind, Result as DomainResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::manager::DbManager;
use super::sql::{from_millis, map_join_error, map_sql_error, parse_kind, to_millis};

/// SQLite-based event mapping repository
pub struct SqliteEventMappingRepository {
    db: Arc<DbManager>,
}

impl SqliteEventMappingRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventMapper for SqliteEventMappingRepository {
    async fn find(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
    ) -> DomainResult<Option<EventMapping>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<EventMapping>> {
            let conn = db.get_connection()?;
            query_mapping(&conn, connection_id, local_id, kind).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(
        &self,
        connection_id: i64,
        local_id: i64,
        kind: ItemKind,
        remote_event_id: &str,
        fingerprint: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let mapping = EventMapping {
            connection_id,
            local_id,
            kind,
            remote_event_id: remote_event_id.to_string(),
            content_fingerprint: fingerprint.to_string(),
            updated_at: Utc::now(),
        };

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_mapping(&conn, &mapping).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, connection_id: i64, local_id: i64, kind: ItemKind) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM event_mappings WHERE connection_id = ?1 AND local_id = ?2 AND kind = ?3",
                params![connection_id, local_id, kind.as_str()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn all_for_connection(&self, connection_id: i64) -> DomainResult<Vec<EventMapping>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<EventMapping>> {
            let conn = db.get_connection()?;
            query_mappings_for_connection(&conn, connection_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_all_for_connection(&self, connection_id: i64) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM event_mappings WHERE connection_id = ?1",
                params![connection_id],
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn upsert_mapping(conn: &Connection, mapping: &EventMapping) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO event_mappings
             (connection_id, local_id, kind, remote_event_id, content_fingerprint, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(connection_id, local_id, kind) DO UPDATE SET
             remote_event_id = excluded.remote_event_id,
             content_fingerprint = excluded.content_fingerprint,
             updated_at = excluded.updated_at",
        params![
            mapping.connection_id,
            mapping.local_id,
            mapping.kind.as_str(),
            &mapping.remote_event_id,
            &mapping.content_fingerprint,
            to_millis(mapping.updated_at),
        ],
    )?;
    Ok(())
}

fn query_mapping(
    conn: &Connection,
    connection_id: i64,
    local_id: i64,
    kind: ItemKind,
) -> rusqlite::Result<Option<EventMapping>> {
    let sql = "SELECT connection_id, local_id, kind, remote_event_id, content_fingerprint, updated_at
               FROM event_mappings
               WHERE connection_id = ?1 AND local_id = ?2 AND kind = ?3";

    conn.query_row(sql, params![connection_id, local_id, kind.as_str()], map_mapping_row)
        .optional()
}

fn query_mappings_for_connection(
    conn: &Connection,
    connection_id: i64,
) -> rusqlite::Result<Vec<EventMapping>> {
    let sql = "SELECT connection_id, local_id, kind, remote_event_id, content_fingerprint, updated_at
               FROM event_mappings WHERE connection_id = ?1
               ORDER BY kind ASC, local_id ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![connection_id], map_mapping_row)?;
    rows.collect()
}

fn map_mapping_row(row: &Row<'_>) -> rusqlite::Result<EventMapping> {
    let kind: String = row.get(2)?;
    Ok(EventMapping {
        connection_id: row.get(0)?,
        local_id: row.get(1)?,
        kind: parse_kind(2, &kind)?,
        remote_event_id: row.get(3)?,
        content_fingerprint: row.get(4)?,
        updated_at: from_millis(5, row.get(5)?)?,
    })
}

// ============================================================================
// Tests
// ============================================================================
