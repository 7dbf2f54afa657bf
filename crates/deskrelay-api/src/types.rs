// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes of the REST endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most endpoints wrap their payload in `{data: ...}`; some return it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } | Envelope::Bare(data) => data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnreadCount {
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    pub file_url: Option<String>,
    pub file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub message: String,
}

/// Body of `POST /notifications`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewNotification<'a> {
    pub user_id: Option<&'a str>,
    pub issue_id: &'a str,
    pub message: &'a str,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_read: bool,
    pub old_status: Option<&'a str>,
    pub new_status: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}
