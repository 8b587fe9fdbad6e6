//! External service integrations

pub mod google;
