// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, known role names, and non-zero limits.

use std::str::FromStr;

use deskrelay_core::Role;

use crate::diagnostic::ConfigError;
use crate::model::DeskRelayConfig;

const LOCALES: &[&str] = &["en", "th"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &DeskRelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_scheme(
        &mut errors,
        "server.socket_url",
        &config.server.socket_url,
        &["ws://", "wss://"],
    );
    check_scheme(
        &mut errors,
        "server.api_base_url",
        &config.server.api_base_url,
        &["http://", "https://"],
    );

    if config.server.request_timeout_secs == 0 {
        errors.push(invalid("server.request_timeout_secs must be greater than 0"));
    }

    if Role::from_str(&config.session.role).is_err() {
        errors.push(invalid(format!(
            "session.role `{}` is not one of User, Admin, SuperAdmin",
            config.session.role
        )));
    }

    if let Some(user_id) = &config.session.user_id
        && user_id.trim().is_empty()
    {
        errors.push(invalid("session.user_id must not be empty when set"));
    }

    if !LOCALES.contains(&config.client.locale.as_str()) {
        errors.push(invalid(format!(
            "client.locale `{}` is not supported (expected one of: {})",
            config.client.locale,
            LOCALES.join(", ")
        )));
    }

    if config.reconnect.max_attempts < 1 {
        errors.push(invalid("reconnect.max_attempts must be at least 1"));
    }

    if config.chat.event_buffer < 1 {
        errors.push(invalid("chat.event_buffer must be at least 1"));
    }

    for (key, value) in [
        ("chat.history_timeout_ms", config.chat.history_timeout_ms),
        ("chat.ack_timeout_secs", config.chat.ack_timeout_secs),
    ] {
        if value == 0 {
            errors.push(invalid(format!("{key} must be greater than 0")));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn check_scheme(errors: &mut Vec<ConfigError>, key: &str, value: &str, schemes: &[&str]) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(invalid(format!("{key} must not be empty")));
    } else if !schemes.iter().any(|s| value.starts_with(s)) {
        errors.push(invalid(format!(
            "{key} `{value}` must start with {}",
            schemes.join(" or ")
        )));
    }
}
