// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client tuning derived from configuration.

use std::time::Duration;

use deskrelay_chat::ChatSettings;
use deskrelay_config::DeskRelayConfig;
use deskrelay_core::{Credentials, DeskRelayError, Role, Session};
use deskrelay_notify::Locale;
use deskrelay_transport::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub reconnect: ReconnectPolicy,
    pub chat: ChatSettings,
    pub locale: Locale,
    /// Capacity of every broadcast channel the client creates.
    pub event_buffer: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            chat: ChatSettings::default(),
            locale: Locale::default(),
            event_buffer: 256,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &DeskRelayConfig) -> Result<Self, DeskRelayError> {
        let locale = config
            .client
            .locale
            .parse()
            .map_err(|_| DeskRelayError::Config(format!("unknown locale `{}`", config.client.locale)))?;
        Ok(Self {
            reconnect: ReconnectPolicy {
                max_attempts: config.reconnect.max_attempts,
                delay: config.reconnect.delay(),
            },
            chat: ChatSettings {
                history_timeout: Duration::from_millis(config.chat.history_timeout_ms),
                file_dedup_window: Duration::from_millis(config.chat.file_dedup_window_ms),
                ack_timeout: Duration::from_secs(config.chat.ack_timeout_secs),
            },
            locale,
            event_buffer: config.chat.event_buffer,
        })
    }
}

/// The session described by `[session]`, if a user id is configured.
pub fn credentials_from_config(config: &DeskRelayConfig) -> Result<Credentials, DeskRelayError> {
    let session = &config.session;
    let user_id = session
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| DeskRelayError::Config("session.user_id is not set".to_string()))?;
    let role: Role = session
        .role
        .parse()
        .map_err(|_| DeskRelayError::Config(format!("unknown role `{}`", session.role)))?;
    Ok(Credentials {
        session: Session {
            id: user_id.to_string(),
            role,
            display_name: session.display_name.clone(),
            profile_image: session.profile_image.clone(),
        },
        token: session.token.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = deskrelay_config::load_and_validate_str(
            r#"
            [client]
            locale = "th"

            [reconnect]
            max_attempts = 3
            delay_ms = 250

            [chat]
            history_timeout_ms = 400
            event_buffer = 8
            "#,
        )
        .unwrap();
        let options = ClientOptions::from_config(&config).unwrap();
        assert_eq!(options.locale, Locale::Th);
        assert_eq!(options.reconnect.max_attempts, 3);
        assert_eq!(options.reconnect.delay, Duration::from_millis(250));
        assert_eq!(options.chat.history_timeout, Duration::from_millis(400));
        assert_eq!(options.chat.file_dedup_window, Duration::from_secs(5));
        assert_eq!(options.event_buffer, 8);
    }

    #[test]
    fn credentials_need_a_user_id() {
        let config = DeskRelayConfig::default();
        assert!(matches!(
            credentials_from_config(&config),
            Err(DeskRelayError::Config(_))
        ));

        let config = deskrelay_config::load_and_validate_str(
            r#"
            [session]
            user_id = "U1"
            role = "Admin"
            display_name = "Ada"
            token = "secret"
            "#,
        )
        .unwrap();
        let creds = credentials_from_config(&config).unwrap();
        assert_eq!(creds.session.role, Role::Admin);
        assert_eq!(creds.session.display_name, "Ada");
        assert_eq!(creds.token.as_deref(), Some("secret"));
    }
}
