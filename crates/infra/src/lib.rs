//! # CalSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for connections, event mappings, run history and
//!   the host application's work items
//! - Google Calendar and OAuth HTTP clients
//! - Configuration loading
//! - The cron-based sync scheduler
//!
//! ## Architecture
//! - Implements traits defined in `calsync-core`
//! - Depends on `calsync-domain` and `calsync-core`
//! - Contains all "impure" code (I/O, network, clocks)

pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use integrations::google::{GoogleCalendarClient, GoogleOAuthClient};
pub use scheduling::{
    SchedulerError, SchedulerResult, SyncScheduler, SyncSchedulerConfig, TickSummary,
};
