//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{
    connect::ConnectArgs, disconnect::DisconnectArgs, serve::ServeArgs, status::StatusArgs,
    sync::{SyncArgs, SyncItemArgs},
    verify::VerifyArgs,
};

#[derive(Debug, Parser)]
#[command(name = "calsync", version, about = "Keep Google Calendar in step with tasks and assignments")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Configuration file (TOML or JSON). Without it the environment is
    /// tried first, then the usual file locations.
    #[arg(long, global = true, env = "CALSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit JSON logs and JSON command output
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile one user's calendar, or every connected calendar
    Sync(SyncArgs),
    /// Reconcile a single task or assignment
    SyncItem(SyncItemArgs),
    /// Check stored tokens against the calendar API
    VerifyTokens(VerifyArgs),
    /// Connection health and recent runs
    Status(StatusArgs),
    /// Store OAuth credentials for a user's calendar
    Connect(ConnectArgs),
    /// Revoke credentials and forget a user's calendar
    Disconnect(DisconnectArgs),
    /// Run the sync scheduler until interrupted
    Serve(ServeArgs),
}

#[cfg(test)]
mod tests {
    use calsync_domain::ItemKind;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_item_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "calsync", "sync-item", "--user", "7", "--kind", "assignment", "--id", "3", "--json",
        ])
        .unwrap();

        assert!(cli.global.json);
        match cli.command {
            Command::SyncItem(args) => {
                assert_eq!(args.user, 7);
                assert_eq!(args.kind, ItemKind::Assignment);
                assert_eq!(args.id, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_item_kind() {
        let err = Cli::try_parse_from(["calsync", "sync-item", "--user", "7", "--kind", "note", "--id", "1"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown item kind"));
    }

    #[test]
    fn sync_without_user_targets_every_connection() {
        let cli = Cli::try_parse_from(["calsync", "sync"]).unwrap();
        assert!(matches!(cli.command, Command::Sync(SyncArgs { user: None })));
    }
}
