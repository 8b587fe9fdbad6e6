//! # CalSync Domain
//!
//! Business domain types and models for the calendar synchronization engine.
//!
//! This crate contains:
//! - Connection, work-item, mapping and sync-result types
//! - The error taxonomy shared by every layer
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other CalSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
