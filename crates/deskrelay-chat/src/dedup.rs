// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication rules for one ticket's chat log.
//!
//! Checks run in order:
//!
//! 1. Identity: the incoming id, or the temp id it echoes, already names an
//!    entry. A confirmed entry makes it a duplicate; an optimistic entry is
//!    reconciled in place.
//! 2. Attachments: same `fileUrl` as a confirmed entry, and either the same
//!    upload id or client timestamps closer than the window. When both sides
//!    carry an upload id only the upload id decides.
//! 3. Reconciliation: an optimistic entry with the same text and `fileUrl`.
//! 4. Otherwise append.

use std::time::Duration;

use deskrelay_core::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Duplicate,
    /// Replace the optimistic entry at this index.
    Reconcile(usize),
    Append,
}

pub fn decide(
    log: &[Message],
    incoming: &Message,
    temp_id: Option<&str>,
    file_window: Duration,
) -> Decision {
    let ids = std::iter::once(incoming.id.as_str()).chain(temp_id);
    for id in ids {
        if let Some(pos) = log.iter().position(|m| m.id == id) {
            return if log[pos].is_optimistic {
                Decision::Reconcile(pos)
            } else {
                Decision::Duplicate
            };
        }
    }

    if log
        .iter()
        .filter(|m| !m.is_optimistic)
        .any(|m| same_attachment(m, incoming, file_window))
    {
        return Decision::Duplicate;
    }

    log.iter()
        .position(|m| m.is_optimistic && m.text == incoming.text && m.file_url == incoming.file_url)
        .map_or(Decision::Append, Decision::Reconcile)
}

fn same_attachment(existing: &Message, incoming: &Message, window: Duration) -> bool {
    let (Some(a), Some(b)) = (&existing.file_url, &incoming.file_url) else {
        return false;
    };
    if a != b {
        return false;
    }
    if let (Some(x), Some(y)) = (&existing.file_upload_id, &incoming.file_upload_id) {
        return x == y;
    }
    match (existing.client_timestamp, incoming.client_timestamp) {
        (Some(x), Some(y)) => x.abs_diff(y) < window.as_millis() as u64,
        _ => false,
    }
}

/// The confirmed message that replaces `optimistic`.
///
/// Client-side attachment metadata the echo omits is carried over.
pub fn reconciled(optimistic: &Message, mut confirmed: Message) -> Message {
    confirmed.is_optimistic = false;
    if confirmed.client_timestamp.is_none() {
        confirmed.client_timestamp = optimistic.client_timestamp;
    }
    if confirmed.file_upload_id.is_none() {
        confirmed.file_upload_id = optimistic.file_upload_id.clone();
    }
    if confirmed.file_name.is_none() {
        confirmed.file_name = optimistic.file_name.clone();
    }
    confirmed
}
