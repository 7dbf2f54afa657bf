// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay watch` command implementation.

use tokio_util::sync::CancellationToken;
use tracing::info;

use deskrelay_client::RelayClient;
use deskrelay_core::DeskRelayError;

use crate::output::{format_alert, format_message};

/// Stream chat messages and alerts until `cancel` fires.
///
/// With `issue`, that ticket's conversation is opened first and its history
/// printed.
pub async fn run_watch(
    client: &RelayClient,
    issue: Option<&str>,
    cancel: CancellationToken,
    use_color: bool,
) -> Result<(), DeskRelayError> {
    let _alerts = client.on_alert(move |alert| println!("{}", format_alert(&alert, use_color)));

    let state = client.start().await;
    if !state.is_connected() {
        eprintln!("deskrelay: not connected, only alerts from REST operations will appear");
    }

    if let Some(issue) = issue {
        for message in client.open_ticket(issue).await {
            println!("{}", format_message(&message, use_color));
        }
    }
    let _messages = client.on_message(move |message| {
        if !message.is_optimistic {
            println!("{}", format_message(&message, use_color));
        }
    });

    info!("watching, press Ctrl+C to stop");
    cancel.cancelled().await;

    if let Some(issue) = issue {
        client.close_ticket(issue).await;
    }
    Ok(())
}
