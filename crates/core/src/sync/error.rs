//! Errors returned by the sync orchestrator

use calsync_domain::{AuthError, CalSyncError, RemoteError, SyncResult};
use thiserror::Error;

/// Why an orchestrated sync did not produce a result
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable token; nothing was attempted
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The calendar API rejected the token mid-run. `partial` holds the
    /// entries processed before the rejection.
    #[error("sync aborted, calendar API rejected the access token: {message}")]
    AuthAborted { message: String, partial: SyncResult },

    /// A diagnostic calendar request failed outside of a sync run
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("calendar connection {0} not found")]
    ConnectionNotFound(i64),

    /// Loading items, mappings or connection state failed
    #[error(transparent)]
    Storage(#[from] CalSyncError),
}

impl SyncError {
    /// Whether the user has to re-authorize before the next attempt.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth(AuthError::ReauthRequired))
    }
}
