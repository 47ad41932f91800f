//! Microsoft Graph type definitions
//!
//! These types mirror the Graph message and event resources, plus the reduced
//! projections returned to MCP clients.

use serde::{Deserialize, Serialize};

/// Collection response wrapper (`{"value": [...]}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// An email address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A message recipient (also used for senders and organizers)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: EmailAddress,
}

impl Recipient {
    /// Recipient with only an address
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            email_address: EmailAddress {
                name: None,
                address: Some(address.into()),
            },
        }
    }
}

/// Body of a message or event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    /// "Text" or "HTML"
    pub content_type: String,

    pub content: String,
}

/// A message as listed from a mail folder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub from: Option<Recipient>,

    #[serde(default)]
    pub received_date_time: Option<String>,

    #[serde(default)]
    pub has_attachments: Option<bool>,

    #[serde(default)]
    pub body_preview: Option<String>,
}

/// Attachment metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub size: Option<i64>,

    #[serde(default)]
    pub content_type: Option<String>,
}

/// Date, time and time zone of an event boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,

    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Event location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A calendar event as listed from the event collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub start: Option<DateTimeTimeZone>,

    #[serde(default)]
    pub end: Option<DateTimeTimeZone>,

    #[serde(default)]
    pub location: Option<Location>,

    #[serde(default)]
    pub is_online_meeting: Option<bool>,

    #[serde(default)]
    pub organizer: Option<Recipient>,
}

/// Event reference returned after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
}

/// Outgoing message payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub subject: String,

    pub body: ItemBody,

    pub to_recipients: Vec<Recipient>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc_recipients: Option<Vec<Recipient>>,
}

/// Request body for `/me/sendMail`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    pub message: OutgoingMessage,

    pub save_to_sent_items: bool,
}

/// Event attendee
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email_address: EmailAddress,

    /// "required", "optional" or "resource"
    #[serde(rename = "type")]
    pub attendee_type: String,
}

/// Request body for creating an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub subject: String,

    pub body: ItemBody,

    pub start: DateTimeTimeZone,

    pub end: DateTimeTimeZone,

    pub location: Location,

    pub is_online_meeting: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

/// Graph error body (`{"error": {"code", "message"}}`)
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorBody {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorDetail {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}

// ==================== Projections ====================

/// Email summary returned by `list_emails`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub received: Option<String>,
    pub has_attachments: Option<bool>,
    pub preview: Option<String>,
}

impl From<Message> for EmailSummary {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            subject: message.subject,
            from: message.from.and_then(|f| f.email_address.address),
            received: message.received_date_time,
            has_attachments: message.has_attachments,
            preview: message.body_preview,
        }
    }
}

/// Attachment summary merged into `read_email` output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub content_type: Option<String>,
}

impl From<Attachment> for AttachmentSummary {
    fn from(att: Attachment) -> Self {
        Self {
            name: att.name,
            size: att.size,
            content_type: att.content_type,
        }
    }
}

/// Event summary returned by `list_calendar_events`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub subject: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub is_online_meeting: Option<bool>,
    pub organizer: Option<String>,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            subject: event.subject,
            start: event.start.map(|s| s.date_time),
            end: event.end.map(|e| e.date_time),
            location: event.location.and_then(|l| l.display_name),
            is_online_meeting: event.is_online_meeting,
            organizer: event.organizer.and_then(|o| o.email_address.address),
        }
    }
}
