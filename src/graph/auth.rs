//! OAuth authentication for Microsoft Graph
//!
//! Handles the interactive browser login against the Microsoft identity
//! platform:
//! - Loading the configuration record (client and tenant ids)
//! - Authorization code flow with PKCE and a local callback server
//! - Token caching and refresh

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::config::graph::{CALLBACK_PATH, CALLBACK_PORT, DEFAULT_SCOPE};
use crate::config::{Config, ConfigRecord};
use crate::error::{AuthError, GraphMcpError, Result};

/// Refresh tokens this many seconds before they expire
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Source of bearer tokens for Graph requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token
    async fn access_token(&self) -> Result<String>;
}

/// A fixed, pre-issued token
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Stored credentials (tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Access token
    pub access_token: String,

    /// Refresh token
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    /// Scopes
    #[serde(default)]
    pub scope: String,
}

impl StoredCredentials {
    fn is_fresh(&self, now: i64) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry - now >= EXPIRY_MARGIN_SECS,
            None => true,
        }
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token response from the identity platform
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: String,
}

/// Outcome delivered by the local callback server
type CallbackOutcome = std::result::Result<(String, String), AuthError>;

/// PKCE verifier and its S256 challenge
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh verifier
    pub fn generate() -> Self {
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::from_verifier(verifier)
    }

    /// Derive the challenge for a known verifier
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Interactive OAuth authenticator
pub struct Authenticator {
    /// Client and tenant ids
    record: ConfigRecord,

    /// Where cached tokens are persisted
    token_cache_path: std::path::PathBuf,

    /// Identity platform authority
    authority_url: String,

    /// HTTP client
    http_client: reqwest::Client,

    /// Current credentials (tokens)
    credentials: Arc<RwLock<Option<StoredCredentials>>>,
}

impl Authenticator {
    /// Create a new authenticator from the configuration record on disk
    pub async fn new(config: &Config) -> Result<Self> {
        let record = config.load_record()?;

        let auth = Self {
            record,
            token_cache_path: config.token_cache_path.clone(),
            authority_url: config.authority_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            credentials: Arc::new(RwLock::new(None)),
        };

        if auth.token_cache_path.exists() {
            match auth.load_credentials().await {
                Ok(creds) => *auth.credentials.write().await = Some(creds),
                Err(e) => tracing::warn!("Ignoring unreadable token cache: {}", e),
            }
        }

        Ok(auth)
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority_url, self.record.tenant_id, name
        )
    }

    fn requested_scopes() -> String {
        format!("{} offline_access", DEFAULT_SCOPE)
    }

    /// Load stored credentials from file
    async fn load_credentials(&self) -> Result<StoredCredentials> {
        let content = tokio::fs::read_to_string(&self.token_cache_path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save credentials to file
    async fn save_credentials(&self, credentials: &StoredCredentials) -> Result<()> {
        let content = serde_json::to_string_pretty(credentials)?;
        tokio::fs::write(&self.token_cache_path, content).await?;
        Ok(())
    }

    async fn store(&self, token_response: TokenResponse, fallback_refresh: Option<String>) -> Result<String> {
        let credentials = StoredCredentials {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token.or(fallback_refresh),
            token_type: token_response.token_type,
            expiry_date: token_response.expires_in.map(|e| now_secs() + e),
            scope: token_response.scope,
        };

        if let Err(e) = self.save_credentials(&credentials).await {
            tracing::warn!("Failed to persist token cache: {}", e);
        }

        let token = credentials.access_token.clone();
        *self.credentials.write().await = Some(credentials);
        Ok(token)
    }

    /// Check if we hold any credentials
    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    /// Return a cached token, refreshing it if it is about to expire
    pub async fn cached_access_token(&self) -> Result<String> {
        let creds = self.credentials.read().await.clone();

        match creds {
            Some(creds) if creds.is_fresh(now_secs()) => Ok(creds.access_token),
            Some(creds) => match creds.refresh_token {
                Some(refresh_token) => self.refresh_token(refresh_token).await,
                None => Err(GraphMcpError::Auth(AuthError::LoginRequired)),
            },
            None => Err(GraphMcpError::Auth(AuthError::LoginRequired)),
        }
    }

    /// Refresh the access token using the refresh token
    async fn refresh_token(&self, refresh_token: String) -> Result<String> {
        let scopes = Self::requested_scopes();
        let params = [
            ("client_id", self.record.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("scope", scopes.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoint("token"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphMcpError::Auth(AuthError::TokenRefreshFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        tracing::debug!("Access token refreshed");
        self.store(token_response, Some(refresh_token)).await
    }

    /// Generate the authorization URL
    pub fn generate_auth_url(&self, state: &str, pkce: &Pkce) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&response_mode=query&scope={}&state={}&code_challenge={}&code_challenge_method=S256&prompt=select_account",
            self.endpoint("authorize"),
            urlencoding::encode(&self.record.client_id),
            urlencoding::encode(&self.record.redirect_uri),
            urlencoding::encode(&Self::requested_scopes()),
            urlencoding::encode(state),
            pkce.challenge,
        )
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str, pkce: &Pkce) -> Result<String> {
        let scopes = Self::requested_scopes();
        let params = [
            ("client_id", self.record.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.record.redirect_uri.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("scope", scopes.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoint("token"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphMcpError::Auth(AuthError::TokenExchangeFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        self.store(token_response, None).await
    }

    /// Port and path of the redirect URI, falling back to the defaults
    fn callback_address(&self) -> (u16, String) {
        match reqwest::Url::parse(&self.record.redirect_uri) {
            Ok(url) => (
                url.port_or_known_default().unwrap_or(CALLBACK_PORT),
                url.path().to_string(),
            ),
            Err(_) => (CALLBACK_PORT, CALLBACK_PATH.to_string()),
        }
    }

    /// Run interactive authentication flow with local HTTP server
    pub async fn authenticate_interactive(&self) -> Result<String> {
        use axum::{extract::Query, response::Html, routing::get, Router};
        use std::collections::HashMap;
        use tokio::sync::oneshot;

        // Claim the callback port before sending the user to the browser
        let (port, path) = self.callback_address();
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            GraphMcpError::Auth(AuthError::CallbackError {
                message: format!("cannot listen on port {}: {}", port, e),
            })
        })?;

        let pkce = Pkce::generate();
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.generate_auth_url(&state, &pkce);

        eprintln!("\nPlease visit this URL to sign in to Microsoft 365:");
        eprintln!("{}\n", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Could not open browser automatically: {}", e);
            eprintln!("Please open the URL manually.");
        }

        let (tx, rx) = oneshot::channel::<CallbackOutcome>();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let tx_clone = tx.clone();
        let callback_handler = move |Query(params): Query<HashMap<String, String>>| async move {
            let outcome = match (params.get("code"), params.get("state")) {
                (Some(code), Some(state)) => Ok((code.clone(), state.clone())),
                _ => match params.get("error") {
                    Some(error) => Err(AuthError::LoginRejected {
                        message: params
                            .get("error_description")
                            .map(|d| format!("{}: {}", error, d))
                            .unwrap_or_else(|| error.clone()),
                    }),
                    None => Err(AuthError::NoAuthCode),
                },
            };
            let page = if outcome.is_ok() {
                Html("<html><body><h1>Authentication successful!</h1><p>You can close this window.</p></body></html>")
            } else {
                Html("<html><body><h1>Authentication failed</h1><p>No authorization code received.</p></body></html>")
            };
            if let Some(tx) = tx_clone.lock().ok().and_then(|mut guard| guard.take()) {
                let _ = tx.send(outcome);
            }
            page
        };

        let app = Router::new().route(&path, get(callback_handler));

        tracing::info!("Waiting for authentication callback on port {}", port);

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                match result {
                    Err(e) => Err(GraphMcpError::Auth(AuthError::CallbackError {
                        message: e.to_string(),
                    })),
                    Ok(()) => Err(GraphMcpError::Auth(AuthError::NoAuthCode)),
                }
            }
            outcome = rx => {
                let (code, returned_state) = outcome
                    .map_err(|_| GraphMcpError::Auth(AuthError::NoAuthCode))??;
                if returned_state != state {
                    return Err(GraphMcpError::Auth(AuthError::StateMismatch));
                }
                tracing::info!("Received authorization code, exchanging for tokens");
                let token = self.exchange_code(&code, &pkce).await?;
                tracing::info!("Authentication completed successfully");
                Ok(token)
            }
        }
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn access_token(&self) -> Result<String> {
        match self.cached_access_token().await {
            Ok(token) => Ok(token),
            Err(GraphMcpError::Auth(AuthError::LoginRequired)) => {
                self.authenticate_interactive().await
            }
            Err(GraphMcpError::Auth(AuthError::TokenRefreshFailed { message })) => {
                tracing::warn!("Token refresh failed, signing in again: {}", message);
                self.authenticate_interactive().await
            }
            Err(e) => Err(e),
        }
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
