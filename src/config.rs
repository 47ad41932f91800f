//! Configuration management for the Outlook MCP Server
//!
//! Handles paths, environment variables, and the persisted configuration
//! record written by the setup wizard.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GraphMcpError, Result};

/// Runtime configuration for the Outlook MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to the configuration record (client and tenant ids)
    pub config_path: PathBuf,

    /// Path to the cached tokens
    pub token_cache_path: PathBuf,

    /// Microsoft Graph base URL
    pub graph_base_url: String,

    /// Identity platform authority (without tenant)
    pub authority_url: String,

    /// Pre-issued bearer token; skips interactive login when set
    pub access_token: Option<String>,
}

impl Config {
    /// Create a new configuration with default paths
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let mut config = Self::with_dir(config_dir);

        if let Ok(path) = std::env::var("OUTLOOK_MCP_CONFIG_PATH") {
            config.config_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("OUTLOOK_MCP_TOKEN_CACHE_PATH") {
            config.token_cache_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("OUTLOOK_GRAPH_BASE_URL") {
            config.graph_base_url = url;
        }
        if let Ok(url) = std::env::var("OUTLOOK_AUTHORITY_URL") {
            config.authority_url = url;
        }
        config.access_token = std::env::var("OUTLOOK_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        Ok(config)
    }

    /// Create a configuration rooted at `config_dir`, ignoring the environment
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            config_path: config_dir.join("config.json"),
            token_cache_path: config_dir.join("token-cache.json"),
            config_dir,
            graph_base_url: graph::API_BASE_URL.to_string(),
            authority_url: graph::AUTHORITY_URL.to_string(),
            access_token: None,
        }
    }

    /// Get the configuration directory, creating it if necessary
    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or(GraphMcpError::Config(ConfigError::HomeDirNotFound))?
            .join(".outlook-mcp");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|_| {
                GraphMcpError::Config(ConfigError::DirCreationFailed {
                    path: config_dir.display().to_string(),
                })
            })?;
        }

        Ok(config_dir)
    }

    /// Check if the configuration record exists
    pub fn record_exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load the configuration record
    pub fn load_record(&self) -> Result<ConfigRecord> {
        ConfigRecord::load(&self.config_path)
    }
}

/// Credentials and scopes persisted by the setup wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    /// Application (client) ID
    pub client_id: String,

    /// Directory (tenant) ID
    pub tenant_id: String,

    /// OAuth redirect URI
    pub redirect_uri: String,

    /// Delegated permission scopes
    pub scopes: Vec<String>,
}

impl ConfigRecord {
    /// Build a record with the fixed redirect URI and scope list
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            redirect_uri: graph::REDIRECT_URI.to_string(),
            scopes: graph::SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Read a record from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GraphMcpError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            GraphMcpError::Config(ConfigError::InvalidConfig {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Write the record to disk as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Microsoft Graph constants
pub mod graph {
    /// Base URL for the Graph API
    pub const API_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

    /// Identity platform authority
    pub const AUTHORITY_URL: &str = "https://login.microsoftonline.com";

    /// Redirect URI registered for the app
    pub const REDIRECT_URI: &str = "http://localhost:3000/auth/callback";

    /// Port and path the local callback server listens on
    pub const CALLBACK_PORT: u16 = 3000;
    pub const CALLBACK_PATH: &str = "/auth/callback";

    /// Scope requested when acquiring tokens
    pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

    /// Time zone attached to every created event
    pub const EVENT_TIME_ZONE: &str = "America/Sao_Paulo";

    /// Delegated permissions written to the configuration record
    pub const SCOPES: [&str; 6] = [
        "https://graph.microsoft.com/Mail.Read",
        "https://graph.microsoft.com/Mail.ReadWrite",
        "https://graph.microsoft.com/Mail.Send",
        "https://graph.microsoft.com/Calendars.Read",
        "https://graph.microsoft.com/Calendars.ReadWrite",
        "https://graph.microsoft.com/User.Read",
    ];
}
