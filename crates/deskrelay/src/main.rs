// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deskrelay - ticket chat and status notifications from the terminal.
//!
//! This is the binary entry point for the Deskrelay client.

mod chat;
mod context;
mod notifications;
mod output;
mod shutdown;
mod status;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Deskrelay - ticket chat and status notifications from the terminal.
#[derive(Parser, Debug)]
#[command(name = "deskrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream messages and alerts until interrupted.
    Watch {
        /// Open this ticket's conversation.
        #[arg(long)]
        issue: Option<String>,
    },
    /// Send a chat message to a ticket.
    Send {
        #[arg(long)]
        issue: String,
        #[arg(long, default_value = "")]
        text: String,
        /// Attach a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a ticket's chat history.
    History {
        #[arg(long)]
        issue: String,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// List, mark read or clear notifications.
    Notifications {
        #[arg(long, conflicts_with = "clear")]
        mark_all_read: bool,
        #[arg(long)]
        clear: bool,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change a ticket's status.
    Status {
        #[arg(long)]
        issue: String,
        #[arg(long)]
        status: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => deskrelay_config::load_and_validate_path(path),
        None => deskrelay_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            deskrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    context::init_tracing(&config.client.log_level);

    let client = match context::build_client(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("deskrelay: {e}");
            std::process::exit(1);
        }
    };
    let use_color = output::use_color(cli.plain);

    let result = match cli.command {
        Commands::Watch { issue } => {
            let cancel = shutdown::install_signal_handler();
            watch::run_watch(&client, issue.as_deref(), cancel, use_color).await
        }
        Commands::Send { issue, text, file } => {
            chat::run_send(&client, &issue, &text, file.as_deref()).await
        }
        Commands::History { issue, json } => {
            chat::run_history(&client, &issue, json, use_color).await
        }
        Commands::Notifications {
            mark_all_read,
            clear,
            json,
        } => notifications::run_notifications(&client, mark_all_read, clear, json, use_color).await,
        Commands::Status {
            issue,
            status,
            topic,
            comment,
        } => {
            status::run_status(&client, &issue, &status, topic.as_deref(), comment.as_deref()).await
        }
    };

    client.shutdown().await;
    if let Err(e) = result {
        eprintln!("deskrelay: {e}");
        std::process::exit(1);
    }
}
