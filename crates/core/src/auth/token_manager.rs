//! Access token validation and refresh

use std::sync::Arc;

use calsync_common::resilience::{RetryConfig, RetryError, RetryExecutor};
use calsync_domain::constants::DEFAULT_TOKEN_REFRESH_MARGIN_SECS;
use calsync_domain::{AccessToken, AuthError, CalendarConnection, RefreshError, Result};
use chrono::{Duration, Utc};
use tracing::{error, info, instrument, warn};

use super::ports::{OAuthTokenClient, TokenStore};
use crate::retry::{refresh_retry_config, RefreshRetryPolicy};

/// Tuning for [`TokenManager`]
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Tokens expiring within this window are refreshed before use
    pub refresh_margin: Duration,
    pub refresh_retry: RetryConfig,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::seconds(DEFAULT_TOKEN_REFRESH_MARGIN_SECS as i64),
            refresh_retry: refresh_retry_config(),
        }
    }
}

/// Hands out access tokens that are valid for at least the refresh margin.
///
/// Callers must hold the connection's sync lock; the manager itself does
/// not serialize refreshes.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthTokenClient>,
    config: TokenManagerConfig,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, oauth: Arc<dyn OAuthTokenClient>) -> Self {
        Self { store, oauth, config: TokenManagerConfig::default() }
    }

    pub fn with_config(mut self, config: TokenManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Return a usable access token, refreshing and persisting it when the
    /// stored one is (nearly) expired.
    ///
    /// `connection` is updated in place with whatever was persisted.
    #[instrument(skip(self, connection), fields(connection_id = connection.id))]
    pub async fn ensure_valid_token(
        &self,
        connection: &mut CalendarConnection,
    ) -> std::result::Result<AccessToken, AuthError> {
        if connection.needs_reauth {
            warn!("connection is marked for re-authorization");
            return Err(AuthError::ReauthRequired);
        }

        if connection.token_usable_at(Utc::now(), self.config.refresh_margin) {
            return Ok(AccessToken::new(connection.access_token.clone()));
        }

        let Some(refresh_token) = connection.refresh_token.clone() else {
            warn!("access token expired and no refresh token is stored");
            self.mark_reauth(connection).await;
            return Err(AuthError::ReauthRequired);
        };

        let executor = RetryExecutor::new(self.config.refresh_retry.clone(), RefreshRetryPolicy);
        let grant = match executor.execute(|| self.oauth.refresh_token(&refresh_token)).await {
            Ok(grant) => grant,
            Err(RetryError::NonRetryable { error: RefreshError::InvalidGrant(message) }) => {
                warn!(%message, "refresh token rejected, re-authorization required");
                self.mark_reauth(connection).await;
                return Err(AuthError::ReauthRequired);
            }
            Err(RetryError::NonRetryable { error }) => {
                warn!(error = %error, "token refresh rejected");
                return Err(AuthError::Transient(error.to_string()));
            }
            Err(RetryError::AttemptsExhausted { attempts, last }) => {
                warn!(attempts, error = %last, "token refresh failed");
                return Err(AuthError::Transient(last.to_string()));
            }
            Err(RetryError::InvalidConfiguration { message }) => {
                return Err(AuthError::Transient(message));
            }
        };

        let now = Utc::now();
        let mut refreshed = connection.clone();
        refreshed.access_token = grant.access_token;
        refreshed.token_expires_at = Some(now + Duration::seconds(grant.expires_in));
        if let Some(rotated) = grant.refresh_token {
            refreshed.refresh_token = Some(rotated);
        }
        refreshed.needs_reauth = false;
        refreshed.updated_at = now;

        if let Err(err) = self.store.save_credentials(&refreshed).await {
            error!(error = %err, "failed to persist refreshed token");
            return Err(AuthError::Transient(err.to_string()));
        }

        info!(expires_in_secs = grant.expires_in, "access token refreshed");
        *connection = refreshed;
        Ok(AccessToken::new(connection.access_token.clone()))
    }

    /// Force the next [`ensure_valid_token`](Self::ensure_valid_token) call to
    /// refresh, after the calendar API rejected the current token.
    #[instrument(skip(self, connection), fields(connection_id = connection.id))]
    pub async fn invalidate(&self, connection: &mut CalendarConnection) -> Result<()> {
        let now = Utc::now();
        connection.token_expires_at = Some(now);
        connection.updated_at = now;
        self.store.save_credentials(connection).await?;
        info!("cached access token invalidated");
        Ok(())
    }

    /// Best-effort revocation of the stored access token.
    pub async fn revoke(&self, connection: &CalendarConnection) {
        match self.oauth.revoke_token(&connection.access_token).await {
            Ok(()) => info!(connection_id = connection.id, "access token revoked"),
            Err(err) => {
                warn!(connection_id = connection.id, error = %err, "failed to revoke access token");
            }
        }
    }

    async fn mark_reauth(&self, connection: &mut CalendarConnection) {
        connection.needs_reauth = true;
        connection.updated_at = Utc::now();
        if let Err(err) = self.store.save_credentials(connection).await {
            error!(error = %err, "failed to persist re-authorization flag");
        }
    }
}
