//! MCP Tool definitions and handlers
//!
//! Defines the five mail and calendar tools and their implementations.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::config::graph::EVENT_TIME_ZONE;
use crate::config::Config;
use crate::error::{GraphMcpError, McpError, Result};
use crate::graph::client::GraphClient;
use crate::graph::types::{
    AttachmentSummary, Attendee, DateTimeTimeZone, EmailAddress, EmailSummary, EventSummary,
    ItemBody, Location, NewEvent, OutgoingMessage, Recipient,
};
use crate::mcp::types::{CallToolResult, Tool};

/// Tool handler
///
/// Owns the Graph client, which is built on the first tool call and reused
/// for the lifetime of the process.
pub struct ToolHandler {
    config: Config,
    client: OnceCell<Arc<GraphClient>>,
}

impl ToolHandler {
    /// Create a tool handler that bootstraps its client from `config` on first use
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Create a tool handler around a client already built from `config`
    pub fn with_client(config: Config, client: Arc<GraphClient>) -> Self {
        Self {
            config,
            client: OnceCell::new_with(Some(client)),
        }
    }

    /// Get the client, building it on first use
    async fn client(&self) -> Result<&Arc<GraphClient>> {
        self.client
            .get_or_try_init(|| async {
                let client = GraphClient::bootstrap(&self.config).await?;
                tracing::info!("Microsoft Graph client initialized");
                Ok::<_, GraphMcpError>(Arc::new(client))
            })
            .await
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def("list_emails", "Lista emails da caixa de entrada", list_emails_schema()),
            tool_def("read_email", "Lê o conteúdo completo de um email", read_email_schema()),
            tool_def("send_email", "Envia um novo email", send_email_schema()),
            tool_def("list_calendar_events", "Lista eventos do calendário", list_calendar_events_schema()),
            tool_def("create_calendar_event", "Cria um novo evento no calendário", create_calendar_event_schema()),
        ]
    }

    /// Call a tool by name
    ///
    /// Tool failures, including unknown tool names, come back as error
    /// results. Only a failure to build the Graph client is returned as `Err`.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult> {
        let client = self.client().await.map_err(|e| {
            tracing::error!("Failed to initialize Graph client: {}", e);
            e
        })?;

        let outcome = match name {
            "list_emails" => handle_list_emails(client, args)
                .await
                .map_err(|e| e.in_action("listar emails")),
            "read_email" => handle_read_email(client, args)
                .await
                .map_err(|e| e.in_action("ler email")),
            "send_email" => handle_send_email(client, args)
                .await
                .map_err(|e| e.in_action("enviar email")),
            "list_calendar_events" => handle_list_calendar_events(client, args)
                .await
                .map_err(|e| e.in_action("listar eventos")),
            "create_calendar_event" => handle_create_calendar_event(client, args)
                .await
                .map_err(|e| e.in_action("criar evento")),
            _ => Err(GraphMcpError::Mcp(McpError::UnknownTool {
                name: name.to_string(),
            })),
        };

        Ok(match outcome {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                tracing::warn!(tool = name, "Tool call failed: {}", e);
                CallToolResult::error(e.to_string())
            }
        })
    }
}

// ==================== Arguments ====================

/// Arguments of `list_emails`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEmailsArgs {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_email_limit", deserialize_with = "deserialize_limit")]
    pub limit: u32,
    #[serde(default)]
    pub search: Option<String>,
}

/// Arguments of `read_email`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEmailArgs {
    pub email_id: String,
}

/// Arguments of `send_email`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailArgs {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub is_html: bool,
}

/// Arguments of `list_calendar_events`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCalendarEventsArgs {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_event_limit", deserialize_with = "deserialize_limit")]
    pub limit: u32,
}

/// Arguments of `create_calendar_event`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCalendarEventArgs {
    pub subject: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub is_online: bool,
}

fn default_folder() -> String {
    "inbox".to_string()
}

fn default_email_limit() -> u32 {
    10
}

fn default_event_limit() -> u32 {
    20
}

/// Accept a JSON number for `limit`, including integral floats such as `5.0`
fn deserialize_limit<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "limit must be a non-negative integer, got {}",
            value
        )));
    }
    Ok(value as u32)
}

/// Deserialize tool arguments; a missing argument object counts as `{}`
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| {
        GraphMcpError::Mcp(McpError::InvalidArguments {
            message: e.to_string(),
        })
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ==================== Tool Handlers ====================

async fn handle_list_emails(client: &GraphClient, args: Value) -> Result<String> {
    let args: ListEmailsArgs = parse_args(args)?;
    let search = non_empty(args.search);

    let emails: Vec<EmailSummary> = client
        .list_messages(&args.folder, args.limit, search.as_deref())
        .await?
        .into_iter()
        .map(EmailSummary::from)
        .collect();

    Ok(serde_json::to_string_pretty(&emails)?)
}

async fn handle_read_email(client: &GraphClient, args: Value) -> Result<String> {
    let args: ReadEmailArgs = parse_args(args)?;

    let mut email = client.get_message(&args.email_id).await?;

    let has_attachments = email
        .get("hasAttachments")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let attachments: Vec<AttachmentSummary> = if has_attachments {
        client
            .list_attachments(&args.email_id)
            .await?
            .into_iter()
            .map(AttachmentSummary::from)
            .collect()
    } else {
        Vec::new()
    };

    email.insert("attachments".to_string(), serde_json::to_value(attachments)?);
    Ok(serde_json::to_string_pretty(&Value::Object(email))?)
}

async fn handle_send_email(client: &GraphClient, args: Value) -> Result<String> {
    let args: SendEmailArgs = parse_args(args)?;
    client.send_mail(build_message(args)).await?;
    Ok("Email enviado com sucesso!".to_string())
}

async fn handle_list_calendar_events(client: &GraphClient, args: Value) -> Result<String> {
    let args: ListCalendarEventsArgs = parse_args(args)?;

    let range = match (non_empty(args.start_date), non_empty(args.end_date)) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };

    let events: Vec<EventSummary> = client
        .list_events(
            args.limit,
            range.as_ref().map(|(s, e)| (s.as_str(), e.as_str())),
        )
        .await?
        .into_iter()
        .map(EventSummary::from)
        .collect();

    Ok(serde_json::to_string_pretty(&events)?)
}

async fn handle_create_calendar_event(client: &GraphClient, args: Value) -> Result<String> {
    let args: CreateCalendarEventArgs = parse_args(args)?;
    let created = client.create_event(&build_event(args)).await?;
    Ok(format!("Evento criado com sucesso! ID: {}", created.id))
}

/// Build the `sendMail` message; `ccRecipients` is left out when `cc` is empty
pub fn build_message(args: SendEmailArgs) -> OutgoingMessage {
    let cc_recipients = if args.cc.is_empty() {
        None
    } else {
        Some(args.cc.into_iter().map(Recipient::address).collect())
    };

    OutgoingMessage {
        subject: args.subject,
        body: ItemBody {
            content_type: if args.is_html { "HTML" } else { "Text" }.to_string(),
            content: args.body,
        },
        to_recipients: args.to.into_iter().map(Recipient::address).collect(),
        cc_recipients,
    }
}

/// Build the event payload; both boundaries carry the fixed time zone
pub fn build_event(args: CreateCalendarEventArgs) -> NewEvent {
    let attendees = if args.attendees.is_empty() {
        None
    } else {
        Some(
            args.attendees
                .into_iter()
                .map(|address| Attendee {
                    email_address: EmailAddress {
                        name: None,
                        address: Some(address),
                    },
                    attendee_type: "required".to_string(),
                })
                .collect(),
        )
    };

    NewEvent {
        subject: args.subject,
        body: ItemBody {
            content_type: "HTML".to_string(),
            content: args.body,
        },
        start: DateTimeTimeZone {
            date_time: args.start,
            time_zone: Some(EVENT_TIME_ZONE.to_string()),
        },
        end: DateTimeTimeZone {
            date_time: args.end,
            time_zone: Some(EVENT_TIME_ZONE.to_string()),
        },
        location: Location {
            display_name: Some(args.location),
        },
        is_online_meeting: args.is_online,
        attendees,
    }
}

// ==================== Tool Schemas ====================

fn tool_def(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn list_emails_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "folder": {
                "type": "string",
                "description": "Pasta do email (inbox, sent, drafts)",
                "default": "inbox"
            },
            "limit": {
                "type": "number",
                "description": "Número máximo de emails",
                "default": 10
            },
            "search": {
                "type": "string",
                "description": "Termo de busca opcional"
            }
        }
    })
}

fn read_email_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "emailId": {
                "type": "string",
                "description": "ID do email"
            }
        },
        "required": ["emailId"]
    })
}

fn send_email_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "to": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Lista de destinatários"
            },
            "subject": {
                "type": "string",
                "description": "Assunto do email"
            },
            "body": {
                "type": "string",
                "description": "Corpo do email"
            },
            "cc": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Lista de emails em cópia"
            },
            "isHtml": {
                "type": "boolean",
                "description": "Se o corpo é HTML",
                "default": false
            }
        },
        "required": ["to", "subject", "body"]
    })
}

fn list_calendar_events_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "startDate": {
                "type": "string",
                "description": "Data inicial (ISO 8601)"
            },
            "endDate": {
                "type": "string",
                "description": "Data final (ISO 8601)"
            },
            "limit": {
                "type": "number",
                "description": "Número máximo de eventos",
                "default": 20
            }
        }
    })
}

fn create_calendar_event_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subject": {
                "type": "string",
                "description": "Título do evento"
            },
            "start": {
                "type": "string",
                "description": "Data/hora de início (ISO 8601)"
            },
            "end": {
                "type": "string",
                "description": "Data/hora de fim (ISO 8601)"
            },
            "body": {
                "type": "string",
                "description": "Descrição do evento"
            },
            "location": {
                "type": "string",
                "description": "Local do evento"
            },
            "attendees": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Lista de emails dos participantes"
            },
            "isOnline": {
                "type": "boolean",
                "description": "Se é um evento online",
                "default": false
            }
        },
        "required": ["subject", "start", "end"]
    })
}
