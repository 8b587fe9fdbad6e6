//! Calendar connection repository
//!
//! SQLite-backed [`TokenStore`]: one row per user holding the OAuth
//! credentials, expiry and sync bookkeeping of their calendar connection.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::TokenStore;
use calsync_domain::{CalSyncError, CalendarConnection, NewConnection, Result as DomainResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::info;

use super::manager::DbManager;
use super::sql::{from_millis, map_join_error, map_sql_error, opt_from_millis, to_millis};

const CONNECTION_COLUMNS: &str = "id, user_id, external_calendar_id, access_token, refresh_token,
     token_expires_at, last_synced_at, needs_reauth, created_at, updated_at";

/// SQLite-based calendar connection repository
pub struct SqliteTokenStore {
    db: Arc<DbManager>,
}

impl SqliteTokenStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn get_connection(&self, connection_id: i64) -> DomainResult<Option<CalendarConnection>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<CalendarConnection>> {
            let conn = db.get_connection()?;
            query_by_id(&conn, connection_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_connection_for_user(
        &self,
        user_id: i64,
    ) -> DomainResult<Option<CalendarConnection>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<CalendarConnection>> {
            let conn = db.get_connection()?;
            query_by_user(&conn, user_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_connections(&self) -> DomainResult<Vec<CalendarConnection>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<CalendarConnection>> {
            let conn = db.get_connection()?;
            query_all(&conn).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert_connection(
        &self,
        connection: &NewConnection,
    ) -> DomainResult<CalendarConnection> {
        let db = Arc::clone(&self.db);
        let connection = connection.clone();

        task::spawn_blocking(move || -> DomainResult<CalendarConnection> {
            let mut conn = db.get_connection()?;
            let dropped = upsert(&mut conn, &connection, Utc::now()).map_err(map_sql_error)?;
            if dropped > 0 {
                info!(
                    user_id = connection.user_id,
                    mappings_dropped = dropped,
                    "calendar changed, existing event mappings dropped"
                );
            }
            query_by_user(&conn, connection.user_id).map_err(map_sql_error)?.ok_or_else(|| {
                CalSyncError::Internal(format!(
                    "connection for user {} vanished after upsert",
                    connection.user_id
                ))
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_credentials(&self, connection: &CalendarConnection) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let connection = connection.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = update_credentials(&conn, &connection).map_err(map_sql_error)?;
            if changed == 0 {
                return Err(CalSyncError::NotFound(format!(
                    "calendar connection {}",
                    connection.id
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_last_synced_at(&self, connection_id: i64, at: DateTime<Utc>) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE calendar_connections SET last_synced_at = ?1 WHERE id = ?2",
                params![to_millis(at), connection_id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_connection(&self, connection_id: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM calendar_connections WHERE id = ?1", params![connection_id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_by_id(conn: &Connection, connection_id: i64) -> rusqlite::Result<Option<CalendarConnection>> {
    let sql = format!("SELECT {CONNECTION_COLUMNS} FROM calendar_connections WHERE id = ?1");
    conn.query_row(&sql, params![connection_id], map_connection_row).optional()
}

fn query_by_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<CalendarConnection>> {
    let sql = format!("SELECT {CONNECTION_COLUMNS} FROM calendar_connections WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id], map_connection_row).optional()
}

fn query_all(conn: &Connection) -> rusqlite::Result<Vec<CalendarConnection>> {
    let sql = format!("SELECT {CONNECTION_COLUMNS} FROM calendar_connections ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_connection_row)?;
    rows.collect()
}

/// Insert or replace the user's connection. Pointing an existing connection
/// at another calendar drops its mappings so every item is created there on
/// the next run. Returns the number of mappings dropped.
fn upsert(
    conn: &mut Connection,
    connection: &NewConnection,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;

    let previous: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, external_calendar_id FROM calendar_connections WHERE user_id = ?1",
            params![connection.user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let mut dropped = 0;
    if let Some((connection_id, calendar_id)) = previous {
        if calendar_id != connection.external_calendar_id {
            dropped = tx.execute(
                "DELETE FROM event_mappings WHERE connection_id = ?1",
                params![connection_id],
            )?;
            tx.execute(
                "UPDATE calendar_connections SET last_synced_at = NULL WHERE id = ?1",
                params![connection_id],
            )?;
        }
    }

    tx.execute(
        "INSERT INTO calendar_connections
             (user_id, external_calendar_id, access_token, refresh_token, token_expires_at,
              needs_reauth, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
             external_calendar_id = excluded.external_calendar_id,
             access_token = excluded.access_token,
             refresh_token = COALESCE(excluded.refresh_token, calendar_connections.refresh_token),
             token_expires_at = excluded.token_expires_at,
             needs_reauth = 0,
             updated_at = excluded.updated_at",
        params![
            connection.user_id,
            &connection.external_calendar_id,
            &connection.access_token,
            &connection.refresh_token,
            connection.token_expires_at.map(to_millis),
            to_millis(now),
        ],
    )?;

    tx.commit()?;
    Ok(dropped)
}

fn update_credentials(conn: &Connection, connection: &CalendarConnection) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE calendar_connections
         SET access_token = ?1, refresh_token = ?2, token_expires_at = ?3,
             needs_reauth = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            &connection.access_token,
            &connection.refresh_token,
            connection.token_expires_at.map(to_millis),
            connection.needs_reauth,
            to_millis(connection.updated_at),
            connection.id,
        ],
    )
}

fn map_connection_row(row: &Row<'_>) -> rusqlite::Result<CalendarConnection> {
    Ok(CalendarConnection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        external_calendar_id: row.get(2)?,
        access_token: row.get(3)?,
        refresh_token: row.get(4)?,
        token_expires_at: opt_from_millis(5, row.get(5)?)?,
        last_synced_at: opt_from_millis(6, row.get(6)?)?,
        needs_reauth: row.get(7)?,
        created_at: from_millis(8, row.get(8)?)?,
        updated_at: from_millis(9, row.get(9)?)?,
    })
}

// ============================================================================
// Tests
// ============================================================================
