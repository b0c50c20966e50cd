use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use client_core::{Attachment, ClientError, Message, MessageOrigin, SendStatus};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::http::{HttpTransport, MultipartField, RequestBody, decode};

const CHAT_PATH: &str = "/chat";

/// Message as the backend serializes it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub sender_id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<WireAttachment>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    pub id: String,
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Response of `GET /chat/:peerId/messages`, newest-first.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct SendMessageResult {
    #[serde(default)]
    created: Vec<WireMessage>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct UnreadCountsResult {
    #[serde(default)]
    counts: HashMap<String, u64>,
}

/// Attachment content staged for upload.
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl WireMessage {
    /// Map to the core model, deriving origin and status from the
    /// authenticated user's id. Own messages coming back from the server
    /// are delivered by definition.
    pub fn into_message(self, my_user_id: &str) -> Message {
        let origin = if self.sender_id == my_user_id {
            MessageOrigin::Me
        } else {
            MessageOrigin::Other
        };
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            text: self.text.unwrap_or_default(),
            created_at: self.created_at,
            origin,
            status: (origin == MessageOrigin::Me).then_some(SendStatus::Delivered),
            attachments: self
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    id: a.id,
                    kind: a.kind,
                    url: a.url,
                    file_name: a.file_name,
                    mime_type: a.mime_type,
                    file_size: a.file_size,
                })
                .collect(),
        }
    }
}

/// Chat endpoints over the authorized transport.
#[derive(Clone)]
pub struct ChatApi {
    http: Arc<dyn HttpTransport>,
}

impl ChatApi {
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self { http }
    }

    /// `GET /chat/:peerId/messages?limit=N`.
    pub async fn get_messages(&self, peer_id: &str, limit: u16) -> Result<ChatHistory, ClientError> {
        let path = format!("{CHAT_PATH}/{peer_id}/messages?limit={limit}");
        let payload = self
            .http
            .request(Method::GET, &path, RequestBody::Empty, HeaderMap::new())
            .await?;
        decode(&path, payload)
    }

    /// `POST /chat/:peerId/messages`: JSON for plain text, multipart with
    /// repeated `files` fields when attachments are present.
    pub async fn send_message(
        &self,
        peer_id: &str,
        text: &str,
        attachments: &[OutgoingAttachment],
    ) -> Result<Vec<WireMessage>, ClientError> {
        let path = format!("{CHAT_PATH}/{peer_id}/messages");

        let body = if attachments.is_empty() {
            RequestBody::Json(json!({ "text": text }))
        } else {
            let mut fields = Vec::with_capacity(attachments.len() + 1);
            if !text.is_empty() {
                fields.push(MultipartField::text("text", text));
            }
            for attachment in attachments {
                fields.push(MultipartField::file(
                    "files",
                    attachment.file_name.clone(),
                    attachment.mime_type.clone(),
                    attachment.bytes.clone(),
                ));
            }
            RequestBody::Multipart(fields)
        };

        let payload = self
            .http
            .request(Method::POST, &path, body, HeaderMap::new())
            .await?;
        let result: SendMessageResult = decode(&path, payload)?;
        Ok(result.created)
    }

    /// `POST /chat/unread-counts`: unread message count per peer.
    pub async fn unread_counts(
        &self,
        peer_ids: &[String],
    ) -> Result<HashMap<String, u64>, ClientError> {
        let path = format!("{CHAT_PATH}/unread-counts");

        let mut seen = HashSet::new();
        let peer_ids: Vec<&str> = peer_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .collect();

        let payload = self
            .http
            .request(
                Method::POST,
                &path,
                RequestBody::Json(json!({ "peerIds": peer_ids })),
                HeaderMap::new(),
            )
            .await?;
        let result: UnreadCountsResult = decode(&path, payload)?;
        Ok(result.counts)
    }
}
