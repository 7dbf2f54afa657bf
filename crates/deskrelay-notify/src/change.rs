// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading status transitions out of inbound event payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;

use deskrelay_core::{DeskRelayError, StatusChange};

fn text(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse `{issueId, oldStatus?, status|newStatus, topic?, comment?, userId?}`.
///
/// `status` wins over `newStatus` when both are present.
pub fn parse_status_change(payload: &Value) -> Result<StatusChange, DeskRelayError> {
    let issue_id = text(payload, "issueId")
        .ok_or_else(|| DeskRelayError::InvalidPayload("status change without issueId".into()))?;
    let new_status = text(payload, "status")
        .or_else(|| text(payload, "newStatus"))
        .ok_or_else(|| {
            DeskRelayError::InvalidPayload(format!("status change for {issue_id} without status"))
        })?;

    Ok(StatusChange {
        id: text(payload, "id").or_else(|| text(payload, "_id")),
        issue_id,
        old_status: text(payload, "oldStatus"),
        new_status,
        topic: text(payload, "topic"),
        comment: text(payload, "comment"),
        user_id: text(payload, "userId"),
        message: text(payload, "message"),
        created_at: text(payload, "createdAt")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}
