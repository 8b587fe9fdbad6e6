//! CalSync - Google Calendar synchronization for tasks and assignments
//!
//! Main entry point for the `calsync` binary.

use std::process::ExitCode;

use calsync_app::utils::init_tracing;
use calsync_app::{execute, AppContext, Cli, CommandOutput};
use calsync_infra::config;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output.rendered);
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<CommandOutput> {
    let config = match &cli.global.config {
        Some(path) => config::load_with_path(path)?,
        None => config::load()?,
    };

    init_tracing(&config.logging, cli.global.json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "calsync starting");

    let ctx = AppContext::new(config)?;
    execute(&ctx, cli.command, cli.global.json).await
}
