//! Helpers shared by the SQLite repositories

use calsync_domain::{CalSyncError, ItemKind};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use tokio::task;

use crate::errors::InfraError;

pub(crate) fn map_sql_error(err: rusqlite::Error) -> CalSyncError {
    CalSyncError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: task::JoinError) -> CalSyncError {
    if err.is_cancelled() {
        CalSyncError::Internal("blocking task cancelled".into())
    } else {
        CalSyncError::Internal(format!("blocking task failed: {err}"))
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Read a millisecond timestamp stored in column `idx`.
pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

pub(crate) fn opt_from_millis(
    idx: usize,
    millis: Option<i64>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|value| from_millis(idx, value)).transpose()
}

pub(crate) fn parse_kind(idx: usize, value: &str) -> rusqlite::Result<ItemKind> {
    value.parse::<ItemKind>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
    })
}

/// Parse a host-application date: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a
/// plain `YYYY-MM-DD` (midnight UTC).
pub(crate) fn parse_host_date(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Some(midnight) =
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unrecognised date: {trimmed}").into(),
    ))
}

/// Whether `value` is a bare `YYYY-MM-DD` with no time of day.
pub(crate) fn is_date_only(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}
