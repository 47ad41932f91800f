//! Microsoft Graph module
//!
//! Contains types, authentication, and client for interacting with the Graph API.

pub mod auth;
pub mod client;
pub mod types;
