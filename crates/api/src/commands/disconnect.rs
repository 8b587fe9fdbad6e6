//! `disconnect`

use std::fmt;

use clap::Args;
use serde::Serialize;

use super::Report;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct DisconnectArgs {
    #[arg(long)]
    pub user: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReport {
    pub connection_id: i64,
    pub mappings_removed: usize,
}

impl fmt::Display for DisconnectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connection {} removed ({} event mappings dropped, calendar events left in place)",
            self.connection_id, self.mappings_removed
        )
    }
}

impl Report for DisconnectReport {}

pub async fn run(ctx: &AppContext, args: DisconnectArgs) -> anyhow::Result<DisconnectReport> {
    let connection = ctx.connection_for_user(args.user).await?;
    let mappings_removed = ctx.orchestrator.disconnect(connection.id).await?;

    Ok(DisconnectReport { connection_id: connection.id, mappings_removed })
}
