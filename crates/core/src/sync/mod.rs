//! Calendar sync: planning, execution and orchestration

pub mod diff;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod orchestrator;
pub mod ports;

pub use diff::DiffEngine;
pub use error::SyncError;
pub use executor::{SyncExecutor, SyncExecutorConfig};
pub use fingerprint::fingerprint;
pub use orchestrator::{ConnectionOutcome, SyncOrchestrator, SyncOrchestratorConfig, TokenCheck};
pub use ports::{EventMapper, RemoteCalendarClient, SyncRunLog, WorkItemSource};
