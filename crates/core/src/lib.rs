//! # CalSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage, the calendar API and the
//!   OAuth token endpoint
//! - Token lifecycle management
//! - Sync planning, execution and orchestration
//!
//! ## Architecture Principles
//! - Only depends on `calsync-common` and `calsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod auth;
pub mod retry;
pub mod sync;

pub use auth::{OAuthTokenClient, TokenManager, TokenManagerConfig, TokenStore};
pub use retry::{RefreshRetryPolicy, RemoteRetryPolicy};
pub use sync::{
    ConnectionOutcome, DiffEngine, EventMapper, RemoteCalendarClient, SyncError, SyncExecutor,
    SyncExecutorConfig, SyncOrchestrator, SyncOrchestratorConfig, SyncRunLog, TokenCheck,
    WorkItemSource,
};
