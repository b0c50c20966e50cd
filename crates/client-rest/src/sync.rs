use async_trait::async_trait;
use chrono::Utc;
use client_core::{
    Attachment, ClientError, ConversationSnapshot, Message, MessageFeed, MessageOrigin, PollSink,
    SendStatus, filter_new, local_message_id, merge_messages,
};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::chat::{ChatApi, OutgoingAttachment};

/// History snapshot size for the initial load.
pub const HISTORY_LIMIT: u16 = 200;
/// Window fetched on every poll tick.
pub const POLL_LIMIT: u16 = 50;

const MAX_ATTACHMENTS_PER_MESSAGE: usize = 10;
const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// Synchronization engine for one conversation.
///
/// Owns the observable message list and merges three sources into it:
/// local optimistic entries, full history loads, and incremental poll
/// results. All list mutation happens under one async mutex followed by
/// [`merge_messages`], which makes the merge the ordering point regardless
/// of how the network calls interleave.
pub struct ChatSync {
    api: ChatApi,
    peer_id: String,
    my_user_id: String,
    messages: Mutex<Vec<Message>>,
    feed: MessageFeed,
}

impl ChatSync {
    pub fn new(api: ChatApi, peer_id: impl Into<String>, my_user_id: impl Into<String>) -> Self {
        Self {
            api,
            peer_id: peer_id.into(),
            my_user_id: my_user_id.into(),
            messages: Mutex::new(Vec::new()),
            feed: MessageFeed::new(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.feed.subscribe()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.feed.snapshot()
    }

    /// Replace the whole list with a fresh server snapshot.
    pub async fn load_history(&self) -> Result<(), ClientError> {
        {
            let guard = self.messages.lock().await;
            self.publish(&guard, true);
        }

        let history = self.api.get_messages(&self.peer_id, HISTORY_LIMIT).await;
        let mut guard = self.messages.lock().await;
        match history {
            Ok(history) => {
                let mapped = history
                    .messages
                    .into_iter()
                    .map(|m| m.into_message(&self.my_user_id))
                    .collect();
                *guard = merge_messages(mapped);
                self.publish(&guard, false);
                Ok(())
            }
            Err(err) => {
                self.publish(&guard, false);
                Err(err)
            }
        }
    }

    /// Send a message with optimistic local echo.
    ///
    /// An empty send (no text, no attachments) creates nothing and is not
    /// an error. On success the optimistic entry is replaced by the
    /// server-confirmed messages; on failure it is marked `Failed` and kept
    /// visible, and the error is surfaced to the caller.
    pub async fn send(
        &self,
        text: &str,
        attachments: Vec<OutgoingAttachment>,
    ) -> Result<Vec<Message>, ClientError> {
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return Ok(Vec::new());
        }
        if attachments.len() > MAX_ATTACHMENTS_PER_MESSAGE {
            return Err(ClientError::Validation(format!(
                "at most {MAX_ATTACHMENTS_PER_MESSAGE} attachments per message"
            )));
        }
        if attachments
            .iter()
            .any(|a| a.bytes.len() > MAX_ATTACHMENT_BYTES)
        {
            return Err(ClientError::Validation(format!(
                "attachments are limited to {MAX_ATTACHMENT_BYTES} bytes"
            )));
        }

        let optimistic = Message {
            id: local_message_id(),
            conversation_id: None,
            sender_id: self.my_user_id.clone(),
            text: text.to_owned(),
            created_at: Utc::now(),
            origin: MessageOrigin::Me,
            status: Some(SendStatus::Sending),
            attachments: attachments.iter().map(placeholder_attachment).collect(),
        };
        let optimistic_id = optimistic.id.clone();

        // Emit before the network call starts; perceived latency is zero.
        {
            let mut guard = self.messages.lock().await;
            let mut combined = vec![optimistic];
            combined.append(&mut guard);
            *guard = merge_messages(combined);
            self.publish(&guard, false);
        }

        let outcome = self.api.send_message(&self.peer_id, text, &attachments).await;
        let mut guard = self.messages.lock().await;
        match outcome {
            Ok(created) => {
                let created: Vec<Message> = created
                    .into_iter()
                    .map(|m| m.into_message(&self.my_user_id))
                    .collect();
                guard.retain(|m| m.id != optimistic_id);
                let mut combined = created.clone();
                combined.append(&mut guard);
                *guard = merge_messages(combined);
                self.publish(&guard, false);
                Ok(created)
            }
            Err(err) => {
                if let Some(entry) = guard.iter_mut().find(|m| m.id == optimistic_id) {
                    entry.status = Some(SendStatus::Failed);
                }
                self.publish(&guard, false);
                Err(err)
            }
        }
    }

    /// Merge a poll batch; a batch with nothing new is a strict no-op.
    pub async fn ingest(&self, batch: Vec<Message>) {
        let mut guard = self.messages.lock().await;
        let mut only_new = filter_new(&guard, batch);
        if only_new.is_empty() {
            return;
        }

        debug!(peer = %self.peer_id, count = only_new.len(), "ingesting new messages");
        only_new.append(&mut guard);
        *guard = merge_messages(only_new);
        self.publish(&guard, false);
    }

    fn publish(&self, messages: &[Message], loading: bool) {
        self.feed.publish(ConversationSnapshot {
            messages: messages.to_vec(),
            loading,
        });
    }
}

fn placeholder_attachment(outgoing: &OutgoingAttachment) -> Attachment {
    let kind = match outgoing.mime_type.as_deref() {
        Some(mime) if mime.starts_with("image/") => "image",
        _ => "file",
    };
    Attachment {
        id: local_message_id(),
        kind: kind.to_owned(),
        url: String::new(),
        file_name: Some(outgoing.file_name.clone()),
        mime_type: outgoing.mime_type.clone(),
        file_size: Some(outgoing.bytes.len() as u64),
    }
}

#[async_trait]
impl PollSink for ChatSync {
    async fn poll_once(&self) -> Result<Vec<Message>, ClientError> {
        let history = self.api.get_messages(&self.peer_id, POLL_LIMIT).await?;
        Ok(history
            .messages
            .into_iter()
            .map(|m| m.into_message(&self.my_user_id))
            .collect())
    }

    async fn ingest(&self, batch: Vec<Message>) {
        ChatSync::ingest(self, batch).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use reqwest::Method;
    use reqwest::header::HeaderMap;
    use serde_json::{Value, json};
    use tokio::sync::{Notify, Semaphore};

    use super::*;
    use crate::http::{HttpTransport, RequestBody};

    /// Scripted transport: pops one canned response per request, optionally
    /// gating each response until the test releases it.
    struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<Result<Value, ClientError>>>,
        calls: std::sync::Mutex<Vec<(Method, String)>>,
        started: Notify,
        release: Semaphore,
        gated: bool,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses),
                calls: std::sync::Mutex::new(Vec::new()),
                started: Notify::new(),
                release: Semaphore::new(0),
                gated: false,
            })
        }

        fn gated(responses: Vec<Result<Value, ClientError>>) -> Arc<Self> {
            let mut transport = Self::new(responses);
            Arc::get_mut(&mut transport).expect("sole owner").gated = true;
            transport
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            _body: RequestBody,
            _headers: HeaderMap,
        ) -> Result<Value, ClientError> {
            self.calls.lock().unwrap().push((method, path.to_owned()));
            self.started.notify_one();
            if self.gated {
                let permit = self.release.acquire().await.expect("gate closed");
                permit.forget();
            }
            self.responses
                .lock()
                .unwrap()
                .pop()
                .expect("unexpected request")
        }
    }

    fn engine(transport: Arc<ScriptedTransport>) -> ChatSync {
        ChatSync::new(ChatApi::new(transport), "peer-1", "u1")
    }

    fn wire(id: &str, sender: &str, ts: i64) -> Value {
        json!({
            "id": id,
            "conversationId": "c1",
            "senderId": sender,
            "text": format!("body-{id}"),
            "createdAt": Utc.timestamp_opt(ts, 0).unwrap().to_rfc3339(),
        })
    }

    fn msg(id: &str, sender: &str, ts: i64) -> Message {
        Message {
            id: id.to_owned(),
            conversation_id: Some("c1".to_owned()),
            sender_id: sender.to_owned(),
            text: format!("body-{id}"),
            created_at: Utc.timestamp_opt(ts, 0).unwrap(),
            origin: if sender == "u1" {
                MessageOrigin::Me
            } else {
                MessageOrigin::Other
            },
            status: None,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn load_history_replaces_list_and_toggles_loading() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "conversationId": "c1",
            "messages": [wire("m2", "peer-1", 20), wire("m1", "u1", 10)],
        }))]);
        let sync = engine(transport);
        let mut rx = sync.subscribe();

        sync.load_history().await.expect("history should load");

        rx.changed().await.expect("feed should emit");
        let snapshot = rx.borrow_and_update().clone();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].id, "m2");
        assert_eq!(snapshot.messages[1].status, Some(SendStatus::Delivered));
    }

    #[tokio::test]
    async fn empty_send_creates_nothing_and_stays_silent() {
        let transport = ScriptedTransport::new(Vec::new());
        let sync = engine(transport.clone());
        let rx = sync.subscribe();

        let created = sync.send("   ", Vec::new()).await.expect("empty send is ok");
        assert!(created.is_empty());
        assert_eq!(transport.call_count(), 0);
        assert!(!rx.has_changed().expect("feed should stay open"));
    }

    #[tokio::test]
    async fn optimistic_round_trip_collapses_to_server_id() {
        let transport = ScriptedTransport::gated(vec![Ok(json!({
            "created": [wire("m1", "u1", 10)],
        }))]);
        let sync = Arc::new(engine(transport.clone()));

        let task = {
            let sync = Arc::clone(&sync);
            tokio::spawn(async move { sync.send("hi", Vec::new()).await })
        };

        // While the request is in flight the optimistic entry is visible.
        transport.started.notified().await;
        let pending = sync.snapshot();
        assert_eq!(pending.messages.len(), 1);
        let optimistic = &pending.messages[0];
        assert!(optimistic.is_local());
        assert_eq!(optimistic.text, "hi");
        assert_eq!(optimistic.origin, MessageOrigin::Me);
        assert_eq!(optimistic.status, Some(SendStatus::Sending));

        transport.release.add_permits(1);
        let created = task
            .await
            .expect("task should not panic")
            .expect("send should succeed");
        assert_eq!(created.len(), 1);

        let settled = sync.snapshot();
        assert_eq!(settled.messages.len(), 1);
        assert_eq!(settled.messages[0].id, "m1");
        assert_eq!(settled.messages[0].status, Some(SendStatus::Delivered));
        assert!(!settled.messages.iter().any(Message::is_local));
    }

    #[tokio::test]
    async fn failed_send_keeps_entry_visible_as_failed() {
        let transport = ScriptedTransport::new(vec![Err(ClientError::Network {
            url: "http://api.example/chat/peer-1/messages".to_owned(),
            cause: "connection refused".to_owned(),
        })]);
        let sync = engine(transport);

        let err = sync
            .send("hi", Vec::new())
            .await
            .expect_err("send should fail");
        assert!(err.is_network());

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.messages[0].is_local());
        assert_eq!(snapshot.messages[0].status, Some(SendStatus::Failed));
    }

    #[tokio::test]
    async fn send_rejects_oversized_attachment_batches() {
        let transport = ScriptedTransport::new(Vec::new());
        let sync = engine(transport.clone());

        let attachment = OutgoingAttachment {
            file_name: "a.bin".to_owned(),
            mime_type: None,
            bytes: vec![0],
        };
        let too_many = vec![attachment; MAX_ATTACHMENTS_PER_MESSAGE + 1];
        let err = sync
            .send("hi", too_many)
            .await
            .expect_err("cap should apply");
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn ingest_merges_only_new_messages() {
        let transport = ScriptedTransport::new(Vec::new());
        let sync = engine(transport);

        sync.ingest(vec![msg("m1", "peer-1", 10), msg("m2", "peer-1", 20)])
            .await;
        let first = sync.snapshot();
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].id, "m2");

        sync.ingest(vec![msg("m2", "peer-1", 20), msg("m3", "peer-1", 30)])
            .await;
        let second = sync.snapshot();
        let ids: Vec<&str> = second.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m3", "m2", "m1"]);

        let distinct: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), ids.len());
    }

    #[tokio::test]
    async fn ingest_of_already_seen_messages_does_not_emit() {
        let transport = ScriptedTransport::new(Vec::new());
        let sync = engine(transport);

        sync.ingest(vec![msg("m1", "peer-1", 10)]).await;
        let mut rx = sync.subscribe();
        rx.borrow_and_update();

        sync.ingest(vec![msg("m1", "peer-1", 10)]).await;
        sync.ingest(Vec::new()).await;

        assert!(!rx.has_changed().expect("feed should stay open"));
        assert_eq!(sync.snapshot().messages.len(), 1);
    }

    #[tokio::test]
    async fn ingest_never_regresses_a_delivered_status() {
        let transport = ScriptedTransport::new(Vec::new());
        let sync = engine(transport);

        let mut delivered = msg("m1", "u1", 10);
        delivered.status = Some(SendStatus::Delivered);
        sync.ingest(vec![delivered]).await;

        // A stale poll echo of the same id at a lower rank changes nothing.
        let mut stale = msg("m1", "u1", 10);
        stale.status = Some(SendStatus::Sending);
        sync.ingest(vec![stale]).await;

        assert_eq!(
            sync.snapshot().messages[0].status,
            Some(SendStatus::Delivered)
        );
    }
}
