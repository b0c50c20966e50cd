//! Core contract shared between the REST adapter and frontend consumers.
//!
//! This crate defines the message/session model, the stable client error
//! taxonomy, the deduplicating merge algorithm, the observable conversation
//! feed, and the focus-driven polling scheduler. It has no HTTP dependency.

/// Stable client error types.
pub mod error;
/// Watch-based conversation feed.
pub mod feed;
/// Deduplicating, status-ranked, newest-first merge.
pub mod merge;
/// Focus-driven polling scheduler.
pub mod poller;
/// Message and session model.
pub mod types;

pub use error::ClientError;
pub use feed::{ConversationSnapshot, MessageFeed};
pub use merge::{filter_new, merge_messages, status_rank};
pub use poller::{FocusPoller, PollSink};
pub use types::{
    Attachment, LOCAL_ID_PREFIX, Message, MessageOrigin, SendStatus, Session, SessionUser,
    local_message_id,
};
