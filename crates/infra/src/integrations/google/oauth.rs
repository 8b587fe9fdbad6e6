//! Google OAuth token endpoint client
//!
//! Performs the refresh-token grant and token revocation. Failures are
//! classified so the token manager can tell a dead grant (re-authorize)
//! from a temporary outage (retry later).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use calsync_core::OAuthTokenClient;
use calsync_domain::{CalSyncError, GoogleConfig, RefreshError, Result, TokenGrant};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, warn};

use super::types::{GoogleTokenResponse, OAuthErrorResponse};
use crate::errors::InfraError;

/// OAuth `error` codes meaning the refresh token can never succeed again.
const DEAD_GRANT_ERRORS: [&str; 3] = ["invalid_grant", "unauthorized_client", "invalid_token"];

/// Google OAuth client (refresh and revoke)
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    revoke_url: String,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        Self::with_endpoints(
            &config.client_id,
            &config.client_secret,
            &config.token_url,
            &config.revoke_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build a client against explicit endpoints.
    pub fn with_endpoints(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        revoke_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(CalSyncError::Config("OAuth client id and secret are required".into()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CalSyncError::from(InfraError::from(err)))?;

        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: token_url.to_string(),
            revoke_url: revoke_url.to_string(),
        })
    }
}

impl fmt::Debug for GoogleOAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleOAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("revoke_url", &self.revoke_url)
            .finish()
    }
}

#[async_trait]
impl OAuthTokenClient for GoogleOAuthClient {
    #[instrument(skip_all)]
    async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, RefreshError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|err| RefreshError::Transient(format!("token request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let err = classify_refresh_failure(status, &read_body(response).await);
            warn!(%status, error = %err, "token refresh failed");
            return Err(err);
        }

        let body: GoogleTokenResponse = response.json().await.map_err(|err| {
            RefreshError::Transient(format!("undecodable token response: {err}"))
        })?;
        debug!(expires_in = body.expires_in, "access token refreshed");

        Ok(TokenGrant {
            access_token: body.access_token,
            expires_in: body.expires_in,
            refresh_token: body.refresh_token.filter(|token| !token.is_empty()),
        })
    }

    #[instrument(skip_all)]
    async fn revoke_token(&self, token: &str) -> std::result::Result<(), RefreshError> {
        let response = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|err| RefreshError::Transient(format!("revoke request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            debug!("token revoked");
            return Ok(());
        }

        let body = read_body(response).await;
        let detail = describe(status, &body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(RefreshError::Transient(detail))
        } else {
            Err(RefreshError::Rejected(detail))
        }
    }
}

async fn read_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

/// Map a failed refresh-token grant to a [`RefreshError`].
pub(crate) fn classify_refresh_failure(status: StatusCode, body: &str) -> RefreshError {
    let parsed: OAuthErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let detail = describe(status, body);

    let dead_grant = DEAD_GRANT_ERRORS.contains(&parsed.error.as_str());
    match status.as_u16() {
        400 | 401 if dead_grant => RefreshError::InvalidGrant(detail),
        401 => RefreshError::InvalidGrant(detail),
        429 | 500..=599 => RefreshError::Transient(detail),
        _ => RefreshError::Rejected(detail),
    }
}

fn describe(status: StatusCode, body: &str) -> String {
    let parsed: OAuthErrorResponse = serde_json::from_str(body).unwrap_or_default();
    match (parsed.error.is_empty(), parsed.error_description) {
        (false, Some(description)) => format!("HTTP {}: {}: {description}", status.as_u16(), parsed.error),
        (false, None) => format!("HTTP {}: {}", status.as_u16(), parsed.error),
        (true, _) => format!("HTTP {}", status.as_u16()),
    }
}
