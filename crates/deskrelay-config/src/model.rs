// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Deskrelay messaging core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Every section of `deskrelay.toml` and the keys it accepts.
///
/// Drives environment variable mapping and key suggestions; kept in step
/// with the structs below by a test.
pub const SECTIONS: &[(&str, &[&str])] = &[
    ("client", &["log_level", "locale"]),
    ("server", &["socket_url", "api_base_url", "request_timeout_secs"]),
    (
        "session",
        &["user_id", "role", "display_name", "profile_image", "token"],
    ),
    ("reconnect", &["max_attempts", "delay_ms"]),
    (
        "chat",
        &[
            "history_timeout_ms",
            "file_dedup_window_ms",
            "ack_timeout_secs",
            "event_buffer",
        ],
    ),
];

/// Keys accepted in `section`, if it is a known section.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Top-level Deskrelay configuration.
///
/// All sections are optional and default to values matching a local
/// development server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeskRelayConfig {
    /// Client-side presentation and logging.
    #[serde(default)]
    pub client: ClientConfig,

    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity used when no credentials are supplied programmatically.
    #[serde(default)]
    pub session: SessionConfig,

    /// Reconnect policy for the realtime connection.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Chat engine tuning.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Client presentation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Locale for generated notification text (`en` or `th`).
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            locale: default_locale(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Realtime endpoint (`ws://` or `wss://`).
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    /// REST base URL (`http://` or `https://`), without trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout for REST calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_url: default_socket_url(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_socket_url() -> String {
    "ws://localhost:4000".to_string()
}

fn default_api_base_url() -> String {
    "http://localhost:4000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Session identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// User id. `None` means no session: the client stays inert.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Role literal (`User`, `Admin`, `SuperAdmin`).
    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub profile_image: Option<String>,

    /// Bearer token for both the realtime handshake and REST calls.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            role: default_role(),
            display_name: String::new(),
            profile_image: None,
            token: None,
        }
    }
}

fn default_role() -> String {
    "User".to_string()
}

/// Reconnect policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Retries after the initial attempt before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

/// Chat engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// How long to wait for the realtime history reply before falling back to REST.
    #[serde(default = "default_history_timeout_ms")]
    pub history_timeout_ms: u64,

    /// Two attachment messages with the same URL closer than this are one message.
    #[serde(default = "default_file_dedup_window_ms")]
    pub file_dedup_window_ms: u64,

    /// Upper bound on waiting for a send acknowledgement.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    /// Capacity of the update broadcast channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_timeout_ms: default_history_timeout_ms(),
            file_dedup_window_ms: default_file_dedup_window_ms(),
            ack_timeout_secs: default_ack_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_history_timeout_ms() -> u64 {
    1000
}

fn default_file_dedup_window_ms() -> u64 {
    5000
}

fn default_ack_timeout_secs() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    256
}
