//! Microsoft Graph API client
//!
//! High-level client for the mail and calendar endpoints used by the tools.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{GraphApiError, GraphMcpError, Result};
use crate::graph::auth::{Authenticator, StaticToken, TokenProvider};
use crate::graph::types::*;

/// Fields fetched by `get_message`
pub const MESSAGE_SELECT: &str = "subject,body,from,to,cc,receivedDateTime,hasAttachments";

/// Microsoft Graph API client
pub struct GraphClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// API base URL (e.g. `https://graph.microsoft.com/v1.0`)
    base_url: String,

    /// Bearer token source
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    /// Create a new Graph client
    pub fn new(tokens: Arc<dyn TokenProvider>, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Build the authenticated client from the on-disk configuration
    ///
    /// A token is acquired up front, so a login that cannot complete fails
    /// here rather than inside the first tool call.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let tokens: Arc<dyn TokenProvider> = match &config.access_token {
            Some(token) => {
                tracing::info!("Using access token from OUTLOOK_ACCESS_TOKEN");
                Arc::new(StaticToken(token.clone()))
            }
            None => Arc::new(Authenticator::new(config).await?),
        };
        tokens.access_token().await?;

        Ok(Self::new(tokens, config.graph_base_url.clone()))
    }

    /// Build a URL from the base and percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let invalid = || {
            GraphMcpError::Graph(GraphApiError::UnexpectedResponse {
                message: format!("invalid Graph base URL: {}", self.base_url),
            })
        };

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-success response into a Graph error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<GraphErrorBody>(&text) {
            Ok(body) if !body.error.code.is_empty() => {
                format!("{}: {}", body.error.code, body.error.message)
            }
            Ok(body) => body.error.message,
            Err(_) if !text.trim().is_empty() => text,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };

        Err(GraphMcpError::Graph(GraphApiError::RequestFailed {
            status: status.as_u16(),
            message,
        }))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let url = self.url(segments)?;
        tracing::debug!(%url, "GET");

        let response = self
            .http_client
            .get(url)
            .query(query)
            .bearer_auth(&token)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn post<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let url = self.url(segments)?;
        tracing::debug!(%url, "POST");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        Self::check(response).await
    }

    // ==================== Mail ====================

    /// List messages in a folder, newest first
    pub async fn list_messages(
        &self,
        folder: &str,
        top: u32,
        search: Option<&str>,
    ) -> Result<Vec<Message>> {
        let mut query = vec![
            ("$top", top.to_string()),
            ("$orderby", "receivedDateTime desc".to_string()),
        ];
        if let Some(search) = search {
            query.push(("$search", format!("\"{}\"", search)));
        }

        let list: Collection<Message> = self
            .get(&["me", "mailFolders", folder, "messages"], &query)
            .await?;
        Ok(list.value)
    }

    /// Get a message by ID, keeping every field Graph returned
    pub async fn get_message(&self, message_id: &str) -> Result<Map<String, Value>> {
        let query = [("$select", MESSAGE_SELECT.to_string())];
        match self.get::<Value>(&["me", "messages", message_id], &query).await? {
            Value::Object(map) => Ok(map),
            other => Err(GraphMcpError::Graph(GraphApiError::UnexpectedResponse {
                message: format!("expected a message object, got {}", other),
            })),
        }
    }

    /// List attachment metadata of a message
    pub async fn list_attachments(&self, message_id: &str) -> Result<Vec<Attachment>> {
        let query = [("$select", "name,size,contentType".to_string())];
        let list: Collection<Attachment> = self
            .get(&["me", "messages", message_id, "attachments"], &query)
            .await?;
        Ok(list.value)
    }

    /// Send a message and keep a copy in Sent Items
    pub async fn send_mail(&self, message: OutgoingMessage) -> Result<()> {
        let request = SendMailRequest {
            message,
            save_to_sent_items: true,
        };
        self.post(&["me", "sendMail"], &request).await?;
        Ok(())
    }

    // ==================== Calendar ====================

    /// List events ordered by start time, optionally within `[start, end]`
    pub async fn list_events(&self, top: u32, range: Option<(&str, &str)>) -> Result<Vec<Event>> {
        let mut query = vec![("$top", top.to_string())];
        if let Some((start, end)) = range {
            query.push((
                "$filter",
                format!(
                    "start/dateTime ge '{}' and end/dateTime le '{}'",
                    start, end
                ),
            ));
        }
        query.push(("$orderby", "start/dateTime".to_string()));

        let list: Collection<Event> = self.get(&["me", "events"], &query).await?;
        Ok(list.value)
    }

    /// Create an event in the default calendar
    pub async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let response = self.post(&["me", "events"], event).await?;
        Ok(response.json().await?)
    }
}
