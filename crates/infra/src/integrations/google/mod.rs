//! Google Calendar and Google OAuth adapters

mod client;
mod oauth;
mod types;

pub use client::GoogleCalendarClient;
pub use oauth::GoogleOAuthClient;
