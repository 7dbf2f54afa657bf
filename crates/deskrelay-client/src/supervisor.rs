// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ties client lifetime to the signed-in session.
//!
//! A fresh [`RelayClient`] is built when a session appears or the identity
//! changes, and the previous one is shut down first. Logging out (a `None`
//! session) shuts the client down; so does dropping the session sender.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deskrelay_core::{Credentials, DeskRelayError};

use crate::client::RelayClient;

/// Builds a client for a session. Called once per login or identity change.
pub type ClientFactory =
    Arc<dyn Fn(&Credentials) -> Result<RelayClient, DeskRelayError> + Send + Sync>;

pub struct SessionSupervisor {
    current: watch::Receiver<Option<Arc<RelayClient>>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionSupervisor {
    pub fn spawn(sessions: watch::Receiver<Option<Credentials>>, factory: ClientFactory) -> Self {
        let (current_tx, current) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervise(sessions, factory, current_tx, cancel.clone()));
        Self {
            current,
            cancel,
            task,
        }
    }

    /// The client for the current session, once started.
    pub fn client(&self) -> Option<Arc<RelayClient>> {
        self.current.borrow().clone()
    }

    /// Observe client replacements.
    pub fn watch_client(&self) -> watch::Receiver<Option<Arc<RelayClient>>> {
        self.current.clone()
    }

    /// Shut down the current client and stop supervising.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "session supervisor ended abnormally");
        }
    }
}

async fn supervise(
    mut sessions: watch::Receiver<Option<Credentials>>,
    factory: ClientFactory,
    current: watch::Sender<Option<Arc<RelayClient>>>,
    cancel: CancellationToken,
) {
    let mut active: Option<Credentials> = None;
    loop {
        let wanted = sessions.borrow_and_update().clone();
        if wanted != active {
            replace(&current, &factory, wanted.as_ref()).await;
            active = wanted;
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    replace(&current, &factory, None).await;
}

async fn replace(
    current: &watch::Sender<Option<Arc<RelayClient>>>,
    factory: &ClientFactory,
    next: Option<&Credentials>,
) {
    if let Some(old) = current.send_replace(None) {
        info!(user_id = %old.session().id, "session ended, disposing client");
        old.shutdown().await;
    }
    let Some(credentials) = next else {
        return;
    };
    match factory(credentials) {
        Ok(client) => {
            info!(user_id = %credentials.session.id, role = %credentials.session.role, "session started");
            let client = Arc::new(client);
            client.start().await;
            current.send_replace(Some(client));
        }
        Err(e) => warn!(user_id = %credentials.session.id, error = %e, "could not build client"),
    }
}
