// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay send` and `deskrelay history` command implementations.

use std::path::Path;

use deskrelay_client::RelayClient;
use deskrelay_core::{Attachment, DeskRelayError};

use crate::output::format_message;

/// Read a file into an attachment.
pub async fn read_attachment(path: &Path) -> Result<Attachment, DeskRelayError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        DeskRelayError::Validation(format!("cannot read {}: {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DeskRelayError::Validation(format!("not a file: {}", path.display())))?
        .to_string();
    Ok(Attachment {
        content_type: content_type_for(&file_name).map(str::to_string),
        file_name,
        bytes,
    })
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    })
}

/// Run the `deskrelay send` command.
pub async fn run_send(
    client: &RelayClient,
    issue: &str,
    text: &str,
    file: Option<&Path>,
) -> Result<(), DeskRelayError> {
    let attachment = match file {
        Some(path) => Some(read_attachment(path).await?),
        None => None,
    };

    if !client.start().await.is_connected() {
        return Err(DeskRelayError::NotConnected);
    }
    let receipt = client.send_message(issue, text, attachment).await?;
    if let Some(e) = receipt.upload_error {
        eprintln!("deskrelay: attachment not sent: {e}");
    }
    println!("sent ({})", receipt.temp_id);
    Ok(())
}

/// Run the `deskrelay history` command.
pub async fn run_history(
    client: &RelayClient,
    issue: &str,
    json: bool,
    use_color: bool,
) -> Result<(), DeskRelayError> {
    client.start().await;
    let messages = client.fetch_history(issue).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&messages)
            .map_err(|e| DeskRelayError::Internal(format!("failed to encode history: {e}")))?;
        println!("{rendered}");
    } else if messages.is_empty() {
        println!("no messages for {issue}");
    } else {
        for message in &messages {
            println!("{}", format_message(message, use_color));
        }
    }
    Ok(())
}
