//! `connect`

use std::fmt;

use anyhow::{anyhow, ensure};
use calsync_domain::NewConnection;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::Report;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct ConnectArgs {
    #[arg(long)]
    pub user: i64,
    #[arg(long, default_value = "primary")]
    pub calendar: String,
    #[arg(long, env = "CALSYNC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
    #[arg(long, env = "CALSYNC_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    #[arg(long)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectReport {
    pub connection_id: i64,
    pub user_id: i64,
    pub calendar_id: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

impl fmt::Display for ConnectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} connected to calendar {} (connection {})",
            self.user_id, self.calendar_id, self.connection_id
        )?;
        if !self.has_refresh_token {
            write!(f, "\n  warning: no refresh token stored, the connection stops working once the access token expires")?;
        }
        Ok(())
    }
}

impl Report for ConnectReport {}

pub async fn run(ctx: &AppContext, args: ConnectArgs) -> anyhow::Result<ConnectReport> {
    ensure!(!args.access_token.trim().is_empty(), "access token must not be empty");
    ensure!(!args.calendar.trim().is_empty(), "calendar id must not be empty");

    let token_expires_at = match args.expires_in {
        Some(secs) => Some(
            Duration::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| anyhow!("--expires-in {secs} is out of range"))?,
        ),
        None => None,
    };

    let connection = ctx
        .store
        .upsert_connection(&NewConnection {
            user_id: args.user,
            external_calendar_id: args.calendar,
            access_token: args.access_token,
            refresh_token: args.refresh_token.filter(|token| !token.trim().is_empty()),
            token_expires_at,
        })
        .await?;

    info!(connection_id = connection.id, user_id = connection.user_id, "calendar connected");

    Ok(ConnectReport {
        connection_id: connection.id,
        user_id: connection.user_id,
        has_refresh_token: connection.refresh_token.is_some(),
        calendar_id: connection.external_calendar_id,
        token_expires_at: connection.token_expires_at,
    })
}
