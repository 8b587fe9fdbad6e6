//! Domain constants

/// Marker stored in each remote event's private extended properties so that
/// events created by this engine can be told apart from user-created ones.
pub const APP_SOURCE: &str = "calsync";

/// Default safety margin subtracted from a token's expiry before it is used.
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Default timeout applied to every remote call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Extra attempts made for a transient remote failure (on top of the first).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// First backoff delay of the per-call retry policy.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Google Calendar color ids used for work-item events.
pub mod colors {
    pub const HIGH_PRIORITY: &str = "11";
    pub const MEDIUM_PRIORITY: &str = "6";
    pub const LOW_PRIORITY: &str = "10";
    pub const NO_PRIORITY: &str = "8";
    pub const ASSIGNMENT: &str = "1";
}
