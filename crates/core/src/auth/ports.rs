//! Port interfaces for calendar credentials

use async_trait::async_trait;
use calsync_domain::{CalendarConnection, NewConnection, RefreshError, Result, TokenGrant};
use chrono::{DateTime, Utc};

/// Persistence for calendar connections and their OAuth credentials
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch a connection by id
    async fn get_connection(&self, connection_id: i64) -> Result<Option<CalendarConnection>>;

    /// Fetch the connection owned by a user
    async fn get_connection_for_user(&self, user_id: i64) -> Result<Option<CalendarConnection>>;

    /// List every connection
    async fn list_connections(&self) -> Result<Vec<CalendarConnection>>;

    /// Create the user's connection, replacing existing credentials and
    /// clearing `needs_reauth`
    async fn upsert_connection(&self, connection: &NewConnection) -> Result<CalendarConnection>;

    /// Atomically persist the credential fields (`access_token`,
    /// `refresh_token`, `token_expires_at`, `needs_reauth`)
    async fn save_credentials(&self, connection: &CalendarConnection) -> Result<()>;

    /// Record the completion time of a successful sync
    async fn set_last_synced_at(&self, connection_id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Remove a connection
    async fn delete_connection(&self, connection_id: i64) -> Result<()>;
}

/// OAuth token endpoint
#[async_trait]
pub trait OAuthTokenClient: Send + Sync {
    /// Exchange a refresh token for a new access token
    async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, RefreshError>;

    /// Revoke an access or refresh token at the provider
    async fn revoke_token(&self, token: &str) -> std::result::Result<(), RefreshError>;
}
