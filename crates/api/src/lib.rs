//! # CalSync App
//!
//! Command-line application layer.
//!
//! This crate contains:
//! - The `calsync` command-line surface
//! - Application context (dependency injection)
//! - Command handlers and their reports
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires the SQLite stores and Google clients into the orchestrator

pub mod cli;
pub mod commands;
pub mod context;
pub mod utils;

pub use cli::{Cli, Command};
pub use commands::{execute, CommandOutput, Report};
pub use context::AppContext;
