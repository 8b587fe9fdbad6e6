//! Credential lifecycle for calendar connections

pub mod ports;
pub mod token_manager;

pub use ports::{OAuthTokenClient, TokenStore};
pub use token_manager::{TokenManager, TokenManagerConfig};
