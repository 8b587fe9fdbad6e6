//! Utility modules for the application layer

pub mod logging;

pub use logging::{init_tracing, mask_secret};
