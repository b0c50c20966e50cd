use std::collections::HashSet;

use crate::types::{Message, SendStatus};

/// Total order used to resolve conflicting statuses for one message id.
///
/// `Failed` outranks everything so a failed optimistic entry is terminal and
/// can never be resurrected to `Sending` by a later merge.
pub fn status_rank(status: Option<SendStatus>) -> u8 {
    match status {
        None => 0,
        Some(SendStatus::Sending) => 1,
        Some(SendStatus::Delivered) => 2,
        Some(SendStatus::Failed) => 3,
    }
}

/// Deduplicate by id and sort newest-first.
///
/// For each id seen more than once, the higher-ranked side's full record
/// wins; on equal rank the most recently seen side wins. The result is
/// ordered by `created_at` descending regardless of arrival order.
pub fn merge_messages(candidates: Vec<Message>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(candidates.len());

    for incoming in candidates {
        match merged.iter_mut().find(|m| m.id == incoming.id) {
            Some(existing) => *existing = merge_pair(existing.clone(), incoming),
            None => merged.push(incoming),
        }
    }

    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

/// Keep messages from `batch` whose id is not already present in `current`.
pub fn filter_new(current: &[Message], batch: Vec<Message>) -> Vec<Message> {
    let existing: HashSet<&str> = current.iter().map(|m| m.id.as_str()).collect();
    batch
        .into_iter()
        .filter(|m| !existing.contains(m.id.as_str()))
        .collect()
}

fn merge_pair(existing: Message, incoming: Message) -> Message {
    if status_rank(existing.status) > status_rank(incoming.status) {
        existing
    } else {
        incoming
    }
}
