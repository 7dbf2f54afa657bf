// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-ticket room subscriptions.
//!
//! The client remembers which ticket is being viewed and the socket its join
//! went out on. Room membership does not survive a new socket, so the viewed
//! room is joined again whenever a different socket comes up.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use deskrelay_core::traits::Connection;
use deskrelay_core::{DeskRelayError, events};

use crate::manager::ConnectionManager;

/// The viewed ticket and the socket that last carried its join.
struct View {
    issue_id: String,
    joined_on: Option<String>,
}

pub struct RoomManager {
    connection: Arc<ConnectionManager>,
    viewing: RwLock<Option<View>>,
}

impl RoomManager {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            connection,
            viewing: RwLock::new(None),
        }
    }

    /// Join a ticket's room and mark it as the one being viewed.
    ///
    /// Without a live connection the join signal is skipped (and logged), but
    /// the ticket is still marked as viewed so its messages do not count as
    /// unread. The join is sent once a connection comes up.
    pub async fn join_room(&self, issue_id: &str) {
        let mut viewing = self.viewing.write().await;
        let joined_on = self.join(issue_id).await;
        *viewing = Some(View {
            issue_id: issue_id.to_string(),
            joined_on,
        });
    }

    /// Re-send the join for the viewed ticket on the socket `socket_id`.
    ///
    /// Does nothing when no ticket is viewed or its join already went out on
    /// that socket. Returns whether a join was sent.
    pub async fn rejoin(&self, socket_id: &str) -> bool {
        let mut viewing = self.viewing.write().await;
        let Some(view) = viewing.as_mut() else {
            return false;
        };
        if view.joined_on.as_deref() == Some(socket_id) {
            return false;
        }
        debug!(issue_id = %view.issue_id, socket_id, "rejoining viewed room");
        view.joined_on = self.join(&view.issue_id).await;
        view.joined_on.is_some()
    }

    /// Leave a ticket's room. Clears the viewed ticket if it was this one.
    pub async fn leave_room(&self, issue_id: &str) {
        {
            let mut viewing = self.viewing.write().await;
            if viewing.as_ref().is_some_and(|v| v.issue_id == issue_id) {
                *viewing = None;
            }
        }
        if let Err(e) = self.connection.emit(events::LEAVE_ROOM, json!(issue_id)).await {
            skipped(events::LEAVE_ROOM, issue_id, &e);
        }
    }

    /// The ticket whose conversation is currently open, if any.
    pub async fn current_room(&self) -> Option<String> {
        self.viewing.read().await.as_ref().map(|v| v.issue_id.clone())
    }

    pub async fn is_viewing(&self, issue_id: &str) -> bool {
        self.viewing
            .read()
            .await
            .as_ref()
            .is_some_and(|v| v.issue_id == issue_id)
    }

    /// Send the join signal. Returns the socket it went out on.
    async fn join(&self, issue_id: &str) -> Option<String> {
        let Some(conn) = self.connection.current().await else {
            skipped(events::JOIN_ROOM, issue_id, &DeskRelayError::NotConnected);
            return None;
        };
        match conn.emit(events::JOIN_ROOM, json!(issue_id)).await {
            Ok(()) => {
                debug!(issue_id = %issue_id, socket_id = %conn.socket_id(), "room joined");
                Some(conn.socket_id().to_string())
            }
            Err(e) => {
                skipped(events::JOIN_ROOM, issue_id, &e);
                None
            }
        }
    }
}

fn skipped(event: &str, issue_id: &str, error: &DeskRelayError) {
    match error {
        DeskRelayError::NotConnected => {
            warn!(event, issue_id = %issue_id, "no active connection, room signal skipped");
        }
        e => warn!(event, issue_id = %issue_id, error = %e, "room signal failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ReconnectPolicy;
    use deskrelay_core::{Role, Session};
    use deskrelay_test_utils::MockTransport;

    async fn setup(connect: bool) -> (Arc<MockTransport>, RoomManager) {
        let transport = Arc::new(MockTransport::new());
        let manager = Arc::new(ConnectionManager::new(
            transport.clone(),
            ReconnectPolicy::default(),
            16,
        ));
        if connect {
            manager
                .connect(&Session::new("u1", Role::User), Some("tok"))
                .await;
        }
        (transport, RoomManager::new(manager))
    }

    #[tokio::test]
    async fn join_and_leave_emit_bare_issue_id() {
        let (transport, rooms) = setup(true).await;

        rooms.join_room("T1").await;
        assert!(rooms.is_viewing("T1").await);
        rooms.leave_room("T1").await;
        assert_eq!(rooms.current_room().await, None);

        assert_eq!(transport.emitted_named(events::JOIN_ROOM).await, vec![json!("T1")]);
        assert_eq!(transport.emitted_named(events::LEAVE_ROOM).await, vec![json!("T1")]);
    }

    #[tokio::test]
    async fn join_without_connection_is_a_noop() {
        let (transport, rooms) = setup(false).await;

        rooms.join_room("T1").await;
        assert!(transport.emitted().await.is_empty());
        assert_eq!(rooms.current_room().await.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn leaving_another_room_keeps_current_view() {
        let (_transport, rooms) = setup(true).await;

        rooms.join_room("T1").await;
        rooms.join_room("T2").await;
        rooms.leave_room("T1").await;
        assert_eq!(rooms.current_room().await.as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn rejoin_only_on_a_new_socket() {
        let transport = Arc::new(MockTransport::new());
        let manager = Arc::new(ConnectionManager::new(
            transport.clone(),
            ReconnectPolicy::default(),
            16,
        ));
        let session = Session::new("u1", Role::User);
        manager.connect(&session, Some("tok")).await;
        let rooms = RoomManager::new(Arc::clone(&manager));

        rooms.join_room("T1").await;
        assert!(!rooms.rejoin("mock-socket-1").await);

        manager.connect(&session, Some("tok")).await;
        assert!(rooms.rejoin("mock-socket-2").await);
        assert!(!rooms.rejoin("mock-socket-2").await);
        assert_eq!(transport.emitted_named(events::JOIN_ROOM).await.len(), 2);
    }

    #[tokio::test]
    async fn join_before_connect_is_sent_on_rejoin() {
        let transport = Arc::new(MockTransport::new());
        let manager = Arc::new(ConnectionManager::new(
            transport.clone(),
            ReconnectPolicy::default(),
            16,
        ));
        let rooms = RoomManager::new(Arc::clone(&manager));

        rooms.join_room("T1").await;
        assert!(!rooms.rejoin("mock-socket-1").await);

        manager
            .connect(&Session::new("u1", Role::User), Some("tok"))
            .await;
        assert!(rooms.rejoin("mock-socket-1").await);
        assert_eq!(transport.emitted_named(events::JOIN_ROOM).await, vec![json!("T1")]);
    }

    #[tokio::test]
    async fn nothing_to_rejoin_after_leaving() {
        let (transport, rooms) = setup(true).await;

        rooms.join_room("T1").await;
        rooms.leave_room("T1").await;
        assert!(!rooms.rejoin("mock-socket-2").await);
        assert_eq!(transport.emitted_named(events::JOIN_ROOM).await.len(), 1);
    }

    #[tokio::test]
    async fn repeated_join_sends_each_signal() {
        let (transport, rooms) = setup(true).await;

        rooms.join_room("T1").await;
        rooms.join_room("T1").await;
        assert_eq!(transport.emitted_named(events::JOIN_ROOM).await.len(), 2);
        assert!(rooms.is_viewing("T1").await);
    }
}
