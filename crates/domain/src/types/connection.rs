//! Calendar connection and credential types

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A user's link to their external calendar, including OAuth credentials.
///
/// Exactly one connection exists per user. `Debug` output never contains the
/// tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct CalendarConnection {
    pub id: i64,
    pub user_id: i64,
    pub external_calendar_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub needs_reauth: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarConnection {
    /// Whether the stored access token may be used at `now`.
    ///
    /// A token without a known expiry is treated as expired so that it gets
    /// refreshed before first use.
    pub fn token_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now < expires_at - margin,
            None => false,
        }
    }

    /// Time left until the token expires, negative once it has.
    pub fn token_expires_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.token_expires_at.map(|expires_at| expires_at - now)
    }
}

impl fmt::Debug for CalendarConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarConnection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("external_calendar_id", &self.external_calendar_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_expires_at", &self.token_expires_at)
            .field("last_synced_at", &self.last_synced_at)
            .field("needs_reauth", &self.needs_reauth)
            .finish_non_exhaustive()
    }
}

/// Credentials captured by an OAuth callback, used to create or replace a
/// user's connection.
#[derive(Clone)]
pub struct NewConnection {
    pub user_id: i64,
    pub external_calendar_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for NewConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewConnection")
            .field("user_id", &self.user_id)
            .field("external_calendar_id", &self.external_calendar_id)
            .field("token_expires_at", &self.token_expires_at)
            .finish_non_exhaustive()
    }
}

/// Bearer token handed to the calendar client.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Successful answer of a refresh-token grant.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
    /// Set when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Sync lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Syncing,
    /// Terminal until the user re-authorizes.
    ReauthRequired,
}

/// Caller-facing snapshot of a connection's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connection_id: i64,
    pub needs_reauth: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub state: ConnectionState,
}
