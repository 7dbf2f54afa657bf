// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end client testing.
//!
//! `TestHarness` assembles a complete `RelayClient` over a [`MockTransport`]
//! and a [`MockTicketService`]. Inbound events are injected through the
//! transport and remote side effects are asserted on the service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use deskrelay_client::{ClientOptions, RelayClient};
use deskrelay_core::{Credentials, Role, Session};

use crate::mock_service::MockTicketService;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    user_id: String,
    role: Role,
    display_name: String,
    token: Option<String>,
    options: ClientOptions,
    connect: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            user_id: "U1".to_string(),
            role: Role::User,
            display_name: "Test User".to_string(),
            token: Some("test-token".to_string()),
            options: ClientOptions::default(),
            connect: true,
        }
    }

    pub fn with_user(mut self, user_id: &str, role: Role) -> Self {
        self.user_id = user_id.to_string();
        self.role = role;
        self
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    /// Start without an auth token; the client stays disconnected.
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Build without calling `start()`.
    pub fn unstarted(mut self) -> Self {
        self.connect = false;
        self
    }

    /// Build the harness and, unless [`unstarted`](Self::unstarted), start the client.
    pub async fn build(self) -> TestHarness {
        let transport = Arc::new(MockTransport::new());
        let service = Arc::new(MockTicketService::new());
        let credentials = Credentials {
            session: Session::new(self.user_id, self.role).with_display_name(self.display_name),
            token: self.token,
        };
        let client = RelayClient::new(
            credentials,
            transport.clone(),
            service.clone(),
            self.options,
        );
        if self.connect {
            client.start().await;
        }
        TestHarness {
            transport,
            service,
            client,
        }
    }
}

/// A `RelayClient` wired to mock collaborators.
pub struct TestHarness {
    /// The mock realtime transport.
    pub transport: Arc<MockTransport>,
    /// The mock REST collaborator.
    pub service: Arc<MockTicketService>,
    /// The client under test.
    pub client: RelayClient,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Deliver a server event to the client. Returns false if not connected.
    pub async fn inject(&self, event: &str, payload: Value) -> bool {
        self.transport.inject(event, payload).await
    }
}

/// Poll `condition` until it holds, panicking after two seconds.
///
/// Inbound events are processed on the client's dispatcher task; this lets
/// tests wait for their effects without fixed sleeps.
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
