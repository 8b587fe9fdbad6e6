//! `sync` and `sync-item`

use std::fmt;

use anyhow::bail;
use calsync_core::{ConnectionOutcome, SyncError};
use calsync_domain::{ItemKind, SyncResult, SyncTrigger};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::Report;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only this user's calendar. Without it every connection that does
    /// not await re-authorization is synced.
    #[arg(long)]
    pub user: Option<i64>,
}

#[derive(Debug, Args)]
pub struct SyncItemArgs {
    #[arg(long)]
    pub user: i64,
    /// `task` or `assignment`
    #[arg(long)]
    pub kind: ItemKind,
    /// Local id of the item
    #[arg(long)]
    pub id: i64,
}

/// How one connection's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Synced,
    Partial,
    /// Another run held the connection
    Busy,
    ReauthRequired,
    Failed,
}

impl RunState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Partial => "partial",
            Self::Busy => "busy",
            Self::ReauthRequired => "reauth required",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSyncReport {
    pub connection_id: i64,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionSyncReport {
    fn from_outcome(connection_id: i64, outcome: Result<Option<SyncResult>, SyncError>) -> Self {
        match outcome {
            Ok(Some(result)) => {
                let state = if result.is_complete() && result.failed == 0 {
                    RunState::Synced
                } else {
                    RunState::Partial
                };
                Self { connection_id, state, result: Some(result), error: None }
            }
            Ok(None) => Self { connection_id, state: RunState::Busy, result: None, error: None },
            Err(SyncError::AuthAborted { message, partial }) => Self {
                connection_id,
                state: RunState::Failed,
                result: Some(partial),
                error: Some(message),
            },
            Err(error) => {
                let state =
                    if error.requires_reauth() { RunState::ReauthRequired } else { RunState::Failed };
                Self { connection_id, state, result: None, error: Some(error.to_string()) }
            }
        }
    }
}

impl From<ConnectionOutcome> for ConnectionSyncReport {
    fn from(outcome: ConnectionOutcome) -> Self {
        Self::from_outcome(outcome.connection_id, outcome.outcome)
    }
}

impl fmt::Display for ConnectionSyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {}: {}", self.connection_id, self.state.as_str())?;
        if let Some(result) = &self.result {
            write!(
                f,
                " (created {}, updated {}, skipped {}, deleted {}, failed {})",
                result.created, result.updated, result.skipped, result.deleted, result.failed
            )?;
            for failure in &result.failures {
                write!(
                    f,
                    "\n  {} {}: {} ({})",
                    failure.kind, failure.local_id, failure.message, failure.error_kind
                )?;
            }
        }
        if let Some(error) = &self.error {
            write!(f, "\n  error: {error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub connections: Vec<ConnectionSyncReport>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, connection) in self.connections.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{connection}")?;
        }
        Ok(())
    }
}

impl Report for SyncReport {
    fn succeeded(&self) -> bool {
        self.connections
            .iter()
            .all(|connection| matches!(connection.state, RunState::Synced | RunState::Busy))
    }
}

pub async fn run(ctx: &AppContext, args: SyncArgs) -> anyhow::Result<SyncReport> {
    if let Some(user_id) = args.user {
        let connection = ctx.connection_for_user(user_id).await?;
        let outcome = ctx.orchestrator.sync_all(connection.id).await.map(Some);
        return Ok(SyncReport {
            connections: vec![ConnectionSyncReport::from_outcome(connection.id, outcome)],
        });
    }

    let outcomes = ctx
        .orchestrator
        .sync_connections(ctx.config.sync.max_concurrent_connections, SyncTrigger::All)
        .await?;
    if outcomes.is_empty() {
        bail!("no calendar connections to sync");
    }

    info!(connections = outcomes.len(), "manual sync finished");
    Ok(SyncReport { connections: outcomes.into_iter().map(Into::into).collect() })
}

pub async fn run_item(ctx: &AppContext, args: SyncItemArgs) -> anyhow::Result<SyncReport> {
    let connection = ctx.connection_for_user(args.user).await?;
    let outcome = ctx.orchestrator.sync_one(connection.id, args.id, args.kind).await.map(Some);

    Ok(SyncReport { connections: vec![ConnectionSyncReport::from_outcome(connection.id, outcome)] })
}

#[cfg(test)]
mod tests {
    use calsync_domain::{AuthError, ItemKey, SyncErrorKind};

    use super::*;

    #[test]
    fn complete_result_is_synced() {
        let result = SyncResult { created: 2, ..SyncResult::default() };
        let report = ConnectionSyncReport::from_outcome(4, Ok(Some(result)));

        assert_eq!(report.state, RunState::Synced);
        assert_eq!(
            report.to_string(),
            "connection 4: synced (created 2, updated 0, skipped 0, deleted 0, failed 0)"
        );
    }

    #[test]
    fn item_failures_are_partial_and_listed() {
        let mut result = SyncResult::default();
        result.record_failure(ItemKey::new(9, ItemKind::Assignment), SyncErrorKind::Permanent, "bad date");
        let report = SyncReport {
            connections: vec![ConnectionSyncReport::from_outcome(1, Ok(Some(result)))],
        };

        assert!(!report.succeeded());
        assert!(report.to_string().contains("assignment 9: bad date"));
    }

    #[test]
    fn busy_connection_does_not_fail_the_command() {
        let report =
            SyncReport { connections: vec![ConnectionSyncReport::from_outcome(1, Ok(None))] };
        assert!(report.succeeded());
        assert_eq!(report.to_string(), "connection 1: busy");
    }

    #[test]
    fn reauth_is_reported_distinctly() {
        let report = ConnectionSyncReport::from_outcome(
            3,
            Err(SyncError::Auth(AuthError::ReauthRequired)),
        );
        assert_eq!(report.state, RunState::ReauthRequired);
        assert!(report.error.is_some());
    }
}
