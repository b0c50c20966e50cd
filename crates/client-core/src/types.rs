use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for client-generated message ids used until the server assigns one.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Generate a fresh local message id for an optimistic entry.
pub fn local_message_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}

/// Which side of the conversation a message belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Sent by the authenticated user.
    Me,
    /// Sent by the peer.
    Other,
}

/// Delivery status of an outgoing message.
///
/// Only meaningful when `origin == Me`. `Sending` is the sole non-terminal
/// state; `Delivered` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SendStatus {
    /// Optimistic entry, not yet acknowledged by the server.
    Sending,
    /// Acknowledged by the server.
    Delivered,
    /// Send attempt failed; the entry stays visible so no typed content is lost.
    Failed,
}

/// Opaque attachment metadata passed through the merge untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Server-side attachment id (or a local picker id before upload).
    pub id: String,
    /// Coarse kind hint, for example `image` or `file`.
    pub kind: String,
    /// Download URL (absolute or backend-relative).
    pub url: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// MIME content type when known.
    pub mime_type: Option<String>,
    /// Size in bytes when known.
    pub file_size: Option<u64>,
}

/// The unit of conversation state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Message id. Either a server-assigned id or a `local-` prefixed one.
    pub id: String,
    /// Conversation the message belongs to, when the server reports it.
    pub conversation_id: Option<String>,
    /// Sender user id.
    pub sender_id: String,
    /// Text body (may be empty for attachment-only messages).
    pub text: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Derived from comparing `sender_id` to the authenticated user's id.
    pub origin: MessageOrigin,
    /// Delivery status; `None` for messages from the peer.
    pub status: Option<SendStatus>,
    /// Attachments, passed through merge logic untouched.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Whether this message still carries a client-generated id.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

/// Authenticated user identity as reported by the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Persisted session record: user identity plus the current token pair.
///
/// Owned by the session manager; the transport layer only reads it and
/// reports refresh outcomes through callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: String,
}
