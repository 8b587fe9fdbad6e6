//! `verify-tokens`

use std::fmt;

use anyhow::bail;
use calsync_core::TokenCheck;
use calsync_domain::CalendarConnection;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use serde::Serialize;
use tracing::warn;

use super::Report;
use crate::utils::mask_secret;
use crate::AppContext;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Only this user's connection
    #[arg(long)]
    pub user: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    pub connection_id: i64,
    pub user_id: i64,
    pub calendar_id: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub valid: bool,
    pub needs_reauth: bool,
    pub refreshed: bool,
    pub sample_events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenReport {
    fn describe(connection: &CalendarConnection) -> Self {
        Self {
            connection_id: connection.id,
            user_id: connection.user_id,
            calendar_id: connection.external_calendar_id.clone(),
            token_expires_at: connection.token_expires_at,
            access_token: mask_secret(&connection.access_token),
            refresh_token: connection.refresh_token.as_deref().map(mask_secret),
            valid: false,
            needs_reauth: connection.needs_reauth,
            refreshed: false,
            sample_events: 0,
            error: None,
        }
    }

    fn from_check(check: &TokenCheck) -> Self {
        Self {
            valid: true,
            refreshed: check.refreshed,
            sample_events: check.sample_events,
            ..Self::describe(&check.connection)
        }
    }
}

impl fmt::Display for TokenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expiry = self
            .token_expires_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "unknown".to_string());

        writeln!(
            f,
            "connection {} (user {}, calendar {}): {}",
            self.connection_id,
            self.user_id,
            self.calendar_id,
            if self.valid { "ok" } else { "invalid" }
        )?;
        writeln!(f, "  access token:  {} (expires {expiry})", self.access_token)?;
        write!(f, "  refresh token: {}", self.refresh_token.as_deref().unwrap_or("none"))?;
        if self.needs_reauth {
            write!(f, "\n  re-authorization required")?;
        }
        if self.refreshed {
            write!(f, "\n  access token was refreshed")?;
        }
        if self.valid {
            write!(f, "\n  app events visible: {}", self.sample_events)?;
        }
        if let Some(error) = &self.error {
            write!(f, "\n  error: {error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub connections: Vec<TokenReport>,
}

impl fmt::Display for VerifyReport {
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

impl Report for VerifyReport {
    fn succeeded(&self) -> bool {
        self.connections.iter().all(|connection| connection.valid)
    }
}

pub async fn run(ctx: &AppContext, args: VerifyArgs) -> anyhow::Result<VerifyReport> {
    let connections = match args.user {
        Some(user_id) => vec![ctx.connection_for_user(user_id).await?],
        None => ctx.store.list_connections().await?,
    };
    if connections.is_empty() {
        bail!("no calendar connections to verify");
    }

    let mut reports = Vec::with_capacity(connections.len());
    for connection in connections {
        let report = match ctx.orchestrator.verify_connection(connection.id).await {
            Ok(check) => TokenReport::from_check(&check),
            Err(error) => {
                warn!(connection_id = connection.id, %error, "token verification failed");
                // Re-read so a flag set by the failed refresh shows up.
                let current = ctx.store.get_connection(connection.id).await?.unwrap_or(connection);
                TokenReport { error: Some(error.to_string()), ..TokenReport::describe(&current) }
            }
        };
        reports.push(report);
    }

    Ok(VerifyReport { connections: reports })
}
