// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the client from configuration.

use std::sync::Arc;

use deskrelay_api::HttpTicketService;
use deskrelay_client::{ClientOptions, RelayClient, credentials_from_config};
use deskrelay_config::DeskRelayConfig;
use deskrelay_core::DeskRelayError;
use deskrelay_transport::WsTransport;

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deskrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

/// A client for the configured session, not yet started.
pub fn build_client(config: &DeskRelayConfig) -> Result<RelayClient, DeskRelayError> {
    let credentials = credentials_from_config(config)?;
    let options = ClientOptions::from_config(config)?;
    let service = HttpTicketService::new(
        &config.server.api_base_url,
        credentials.token.as_deref(),
        config.server.request_timeout(),
    )?
    .with_user(credentials.session.id.clone());
    let transport = WsTransport::new(config.server.socket_url.clone(), options.event_buffer);
    Ok(RelayClient::new(
        credentials,
        Arc::new(transport),
        Arc::new(service),
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_session_user() {
        let config = DeskRelayConfig::default();
        assert!(matches!(build_client(&config), Err(DeskRelayError::Config(_))));
    }

    #[tokio::test]
    async fn build_uses_configured_session() {
        let config = deskrelay_config::load_and_validate_str(
            r#"
            [session]
            user_id = "U1"
            role = "SuperAdmin"
            token = "t"
            "#,
        )
        .unwrap();
        let client = build_client(&config).unwrap();
        assert_eq!(client.session().id, "U1");
        assert!(!client.connection_state().is_connected());
    }
}
