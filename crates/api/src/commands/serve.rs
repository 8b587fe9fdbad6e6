//! `serve`

use std::fmt;

use clap::Args;
use serde::Serialize;
use tracing::info;

use super::Report;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Sync every connection once before waiting for the first cron tick
    #[arg(long)]
    pub run_now: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeReport {
    pub cron_expression: String,
    /// Connections synced by the `--run-now` pass
    pub initial_synced: usize,
    pub initial_failed: usize,
}

impl fmt::Display for ServeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scheduler ({}) stopped", self.cron_expression)
    }
}

impl Report for ServeReport {}

pub async fn run(ctx: &AppContext, args: ServeArgs) -> anyhow::Result<ServeReport> {
    let mut scheduler = ctx.scheduler();
    let mut report =
        ServeReport { cron_expression: ctx.config.sync.cron_expression.clone(), ..Default::default() };

    if args.run_now {
        let summary = scheduler.run_now().await;
        report.initial_synced = summary.synced;
        report.initial_failed = summary.failed;
    }

    scheduler.start().await?;
    info!(cron = %report.cron_expression, "sync scheduler running, press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    let stopped = scheduler.stop().await;
    signal?;
    stopped?;

    Ok(report)
}
