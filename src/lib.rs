//! Outlook MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Outlook mail and calendar.
//! Provides tools for listing, reading and sending emails and for listing and
//! creating calendar events via the Microsoft Graph API.

pub mod config;
pub mod error;
pub mod graph;
pub mod mcp;
pub mod setup;

pub use config::Config;
pub use error::{GraphMcpError, Result};
