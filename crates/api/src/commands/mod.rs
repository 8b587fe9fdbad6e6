//! CLI command handlers
//!
//! Each handler takes the wired [`AppContext`] and returns a report that
//! renders either as text or as JSON.

pub mod connect;
pub mod disconnect;
pub mod serve;
pub mod status;
pub mod sync;
pub mod verify;

use std::fmt::Display;

use serde::Serialize;

use crate::cli::Command;
use crate::AppContext;

/// Result of a command, printable for humans and machines.
pub trait Report: Display + Serialize {
    /// Whether the process should exit successfully.
    fn succeeded(&self) -> bool {
        true
    }
}

/// A rendered report plus the exit status it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub rendered: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn render<R: Report>(report: &R, json: bool) -> anyhow::Result<Self> {
        let rendered =
            if json { serde_json::to_string_pretty(report)? } else { report.to_string() };
        Ok(Self { rendered, success: report.succeeded() })
    }
}

/// Run `command` against `ctx`.
pub async fn execute(ctx: &AppContext, command: Command, json: bool) -> anyhow::Result<CommandOutput> {
    match command {
        Command::Sync(args) => CommandOutput::render(&sync::run(ctx, args).await?, json),
        Command::SyncItem(args) => CommandOutput::render(&sync::run_item(ctx, args).await?, json),
        Command::VerifyTokens(args) => CommandOutput::render(&verify::run(ctx, args).await?, json),
        Command::Status(args) => CommandOutput::render(&status::run(ctx, args).await?, json),
        Command::Connect(args) => CommandOutput::render(&connect::run(ctx, args).await?, json),
        Command::Disconnect(args) => {
            CommandOutput::render(&disconnect::run(ctx, args).await?, json)
        }
        Command::Serve(args) => CommandOutput::render(&serve::run(ctx, args).await?, json),
    }
}
