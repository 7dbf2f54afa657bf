// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay status` command implementation.

use deskrelay_client::RelayClient;
use deskrelay_core::DeskRelayError;

/// Run the `deskrelay status` command: ask the server to move a ticket.
pub async fn run_status(
    client: &RelayClient,
    issue: &str,
    status: &str,
    topic: Option<&str>,
    comment: Option<&str>,
) -> Result<(), DeskRelayError> {
    if status.trim().is_empty() {
        return Err(DeskRelayError::Validation("status must not be empty".to_string()));
    }
    if !client.start().await.is_connected() {
        return Err(DeskRelayError::NotConnected);
    }
    client.update_status(issue, status, topic, comment).await?;
    println!("{issue}: status set to {status}");
    Ok(())
}
