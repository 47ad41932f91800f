//! Error types for the Outlook MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.
//! User-facing messages are in Portuguese, matching the tool descriptions.

use thiserror::Error;

/// Main error type for the Outlook MCP Server
#[derive(Error, Debug)]
pub enum GraphMcpError {
    /// OAuth authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Microsoft Graph API errors
    #[error("{0}")]
    Graph(#[from] GraphApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("{0}")]
    Mcp(#[from] McpError),

    /// Setup wizard errors
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Failure of a single tool, prefixed with the action that failed
    #[error("Erro ao {action}: {source}")]
    Tool {
        action: &'static str,
        #[source]
        source: Box<GraphMcpError>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GraphMcpError {
    /// Wrap this error with the tool action that produced it
    pub fn in_action(self, action: &'static str) -> Self {
        GraphMcpError::Tool {
            action,
            source: Box::new(self),
        }
    }
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No cached token and interactive login is required")]
    LoginRequired,

    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("Login rejected by identity provider: {message}")]
    LoginRejected { message: String },

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },
}

/// Microsoft Graph API errors
#[derive(Error, Debug)]
pub enum GraphApiError {
    #[error("{message} (HTTP {status})")]
    RequestFailed { status: u16, message: String },

    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create config directory: {path}")]
    DirCreationFailed { path: String },

    #[error("Config file not found: {path} (run 'outlook-mcp-server setup' first)")]
    FileNotFound { path: String },

    #[error("Invalid config file {path}: {message}")]
    InvalidConfig { path: String, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Ferramenta desconhecida: {name}")]
    UnknownTool { name: String },

    #[error("Argumentos inválidos: {message}")]
    InvalidArguments { message: String },
}

/// Setup wizard errors
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Input closed before setup was completed")]
    InputClosed,
}

/// Result type alias for Outlook MCP operations
pub type Result<T> = std::result::Result<T, GraphMcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::FileNotFound {
            path: "/path/to/config.json".to_string(),
        };
        assert!(err.to_string().contains("/path/to/config.json"));
    }

    #[test]
    fn test_error_conversion() {
        let auth_err = AuthError::NoAuthCode;
        let err: GraphMcpError = auth_err.into();
        assert!(matches!(err, GraphMcpError::Auth(_)));
    }

    #[test]
    fn test_tool_action_prefix() {
        let err = GraphMcpError::from(GraphApiError::RequestFailed {
            status: 404,
            message: "ErrorItemNotFound: The specified object was not found in the store."
                .to_string(),
        })
        .in_action("ler email");

        let text = err.to_string();
        assert!(text.starts_with("Erro ao ler email: ErrorItemNotFound"));
        assert!(text.ends_with("(HTTP 404)"));
    }

    #[test]
    fn test_unknown_tool_message() {
        let err: GraphMcpError = McpError::UnknownTool {
            name: "delete_everything".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Ferramenta desconhecida: delete_everything");
    }
}
