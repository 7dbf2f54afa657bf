// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the ticket service REST endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use deskrelay_core::traits::TicketService;
use deskrelay_core::{Attachment, DeskRelayError, Notification, NotificationRecord, UploadedFile};

use crate::types::{ApiError, Envelope, NewNotification, UnreadCount, UploadResponse};

/// REST implementation of [`TicketService`].
///
/// The bearer token is installed as a default header, so every request
/// carries it.
#[derive(Debug, Clone)]
pub struct HttpTicketService {
    client: reqwest::Client,
    base_url: String,
    /// Notifications saved without a recipient are attributed to this user.
    user_id: Option<String>,
    max_retries: u32,
}

impl HttpTicketService {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, DeskRelayError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                DeskRelayError::Config(format!("invalid auth token header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DeskRelayError::Service {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: None,
            max_retries: 1,
        })
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// GET with one retry on transient status codes.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeskRelayError> {
        let mut attempt = 0;
        loop {
            let response = send(self.request(Method::GET, path)).await?;
            let status = response.status();
            debug!(path, status = %status, attempt, "GET");

            if status.is_success() {
                return parse(response).await;
            }
            if is_transient_error(status) && attempt < self.max_retries {
                attempt += 1;
                warn!(path, status = %status, "transient error, will retry");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            return Err(error_from(response).await);
        }
    }

    /// A mutation whose response body is ignored.
    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<(), DeskRelayError> {
        let response = send(request).await?;
        let status = response.status();
        debug!(path, status = %status, "mutation");
        if status.is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}

async fn send(request: RequestBuilder) -> Result<Response, DeskRelayError> {
    request.send().await.map_err(|e| DeskRelayError::Service {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, DeskRelayError> {
    let body = response.text().await.map_err(|e| DeskRelayError::Service {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| DeskRelayError::Service {
        message: format!("failed to parse response: {e}"),
        source: Some(Box::new(e)),
    })
}

async fn error_from(response: Response) -> DeskRelayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_err) => format!("server returned {status}: {}", api_err.message),
        Err(_) => format!("server returned {status}: {body}"),
    };
    DeskRelayError::Service {
        message,
        source: None,
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[async_trait]
impl TicketService for HttpTicketService {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationRecord>, DeskRelayError> {
        let envelope: Envelope<Vec<NotificationRecord>> =
            self.get_json(&format!("/notifications/{user_id}")).await?;
        Ok(envelope.into_inner())
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), DeskRelayError> {
        let path = "/notifications";
        let body = NewNotification {
            user_id: notification.user_id.as_deref().or(self.user_id.as_deref()),
            issue_id: &notification.issue_id,
            message: &notification.message,
            kind: notification.kind.to_string(),
            is_read: notification.read,
            old_status: notification.old_status.as_deref(),
            new_status: notification.new_status.as_deref(),
            created_at: notification.created_at,
        };
        self.execute(self.request(Method::POST, path).json(&body), path)
            .await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), DeskRelayError> {
        let path = format!("/notifications/read/{notification_id}");
        self.execute(self.request(Method::PUT, &path), &path).await
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), DeskRelayError> {
        let path = format!("/notifications/readAll/{user_id}");
        self.execute(self.request(Method::PUT, &path), &path).await
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<(), DeskRelayError> {
        let path = format!("/notifications/delete/{notification_id}");
        self.execute(self.request(Method::DELETE, &path), &path)
            .await
    }

    async fn delete_all_notifications(&self, user_id: &str) -> Result<(), DeskRelayError> {
        let path = format!("/notifications/deleteAll/{user_id}");
        self.execute(self.request(Method::DELETE, &path), &path)
            .await
    }

    async fn fetch_chat_history(&self, issue_id: &str) -> Result<Vec<Value>, DeskRelayError> {
        let envelope: Envelope<Vec<Value>> =
            self.get_json(&format!("/reports/chat/{issue_id}")).await?;
        Ok(envelope.into_inner())
    }

    async fn mark_chat_read(&self, issue_id: &str) -> Result<(), DeskRelayError> {
        let path = format!("/reports/chat/{issue_id}/mark-read");
        self.execute(
            self.request(Method::POST, &path).json(&serde_json::json!({})),
            &path,
        )
        .await
    }

    async fn chat_unread_count(&self, issue_id: &str) -> Result<u32, DeskRelayError> {
        let envelope: Envelope<UnreadCount> = self
            .get_json(&format!("/reports/chat/{issue_id}/unread-count"))
            .await?;
        Ok(envelope.into_inner().unread_count)
    }

    async fn upload_attachment(
        &self,
        issue_id: &str,
        attachment: &Attachment,
    ) -> Result<UploadedFile, DeskRelayError> {
        let mut part = reqwest::multipart::Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone());
        if let Some(content_type) = &attachment.content_type {
            part = part.mime_str(content_type).map_err(|e| DeskRelayError::Upload {
                message: format!("invalid content type `{content_type}`"),
                source: Some(Box::new(e)),
            })?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("issueId", issue_id.to_string());

        let upload_err = |e: DeskRelayError| DeskRelayError::Upload {
            message: e.to_string(),
            source: Some(Box::new(e)),
        };
        let response = send(self.request(Method::POST, "/upload/chat").multipart(form))
            .await
            .map_err(upload_err)?;
        if !response.status().is_success() {
            return Err(upload_err(error_from(response).await));
        }
        let body: UploadResponse = parse(response).await.map_err(upload_err)?;

        let file_url = body.file_url.ok_or_else(|| DeskRelayError::Upload {
            message: "upload response has no fileUrl".to_string(),
            source: None,
        })?;
        let file_upload_id = body
            .file_id
            .unwrap_or_else(|| format!("file_{}", chrono::Utc::now().timestamp_millis()));
        debug!(issue_id, file_url = %file_url, "attachment uploaded");

        Ok(UploadedFile {
            file_url,
            file_name: attachment.file_name.clone(),
            file_upload_id,
        })
    }
}
