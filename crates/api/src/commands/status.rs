//! `status`

use std::fmt;

use calsync_domain::{ConnectionState, ConnectionStatus, SyncRun};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use serde::Serialize;

use super::Report;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub user: i64,
    /// How many recent runs to show
    #[arg(long, default_value_t = 5)]
    pub runs: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub user_id: i64,
    pub calendar_id: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub status: ConnectionStatus,
    pub recent_runs: Vec<SyncRun>,
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".to_string())
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.status.state {
            ConnectionState::Idle => "idle",
            ConnectionState::Syncing => "syncing",
            ConnectionState::ReauthRequired => "re-authorization required",
        };

        writeln!(f, "connection {} (user {})", self.status.connection_id, self.user_id)?;
        writeln!(f, "  calendar:      {}", self.calendar_id)?;
        writeln!(f, "  state:         {state}")?;
        writeln!(f, "  last synced:   {}", timestamp(self.status.last_synced_at))?;
        write!(f, "  token expires: {}", timestamp(self.token_expires_at))?;

        if self.recent_runs.is_empty() {
            return write!(f, "\n  no recorded runs");
        }
        write!(f, "\n  recent runs:")?;
        for run in &self.recent_runs {
            write!(
                f,
                "\n    {} {:<7} {:<15} +{} ~{} ={} -{} !{}",
                run.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                run.trigger.as_str(),
                run.status.as_str(),
                run.created,
                run.updated,
                run.skipped,
                run.deleted,
                run.failed,
            )?;
            if let Some(message) = &run.error_message {
                write!(f, " ({message})")?;
            }
        }
        Ok(())
    }
}

impl Report for StatusReport {}

pub async fn run(ctx: &AppContext, args: StatusArgs) -> anyhow::Result<StatusReport> {
    let connection = ctx.connection_for_user(args.user).await?;
    let status = ctx.orchestrator.get_connection_status(connection.id).await?;
    let recent_runs = ctx.orchestrator.recent_runs(connection.id, args.runs).await?;

    Ok(StatusReport {
        user_id: connection.user_id,
        calendar_id: connection.external_calendar_id,
        token_expires_at: connection.token_expires_at,
        status,
        recent_runs,
    })
}
