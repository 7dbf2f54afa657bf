// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each dialed socket is driven by one handler task that owns both halves of
//! the stream. Callers talk to it through a command channel; acknowledged
//! emits are correlated by a per-socket ack id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use deskrelay_core::traits::{Connection, Dialed, Transport};
use deskrelay_core::{DeskRelayError, InboundEvent};

use crate::codec::{self, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Response header carrying the server-assigned socket id.
pub const SOCKET_ID_HEADER: &str = "x-socket-id";

const COMMAND_BUFFER: usize = 64;

/// Dials the realtime server over WebSocket.
pub struct WsTransport {
    url: String,
    event_buffer: usize,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, event_buffer: usize) -> Self {
        Self {
            url: url.into(),
            event_buffer: event_buffer.max(1),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn dial(&self, auth_token: &str) -> Result<Dialed, DeskRelayError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| DeskRelayError::Transport {
                message: format!("invalid socket url `{}`", self.url),
                source: Some(Box::new(e)),
            })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {auth_token}")).map_err(|e| {
            DeskRelayError::Transport {
                message: "auth token is not a valid header value".to_string(),
                source: Some(Box::new(e)),
            }
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| DeskRelayError::Transport {
                message: format!("websocket handshake with {} failed", self.url),
                source: Some(Box::new(e)),
            })?;

        let socket_id = response
            .headers()
            .get(SOCKET_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(url = %self.url, socket_id = %socket_id, "websocket connected");

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(self.event_buffer);
        let open = Arc::new(AtomicBool::new(true));
        tokio::spawn(handler_loop(ws, cmd_rx, event_tx, Arc::clone(&open)));

        Ok(Dialed {
            connection: Arc::new(WsConnection {
                socket_id,
                cmd_tx,
                open,
            }),
            events: event_rx,
        })
    }
}

enum Command {
    Emit {
        event: String,
        data: Value,
        reply: Option<oneshot::Sender<Value>>,
    },
    Close,
}

/// A live WebSocket connection handle.
struct WsConnection {
    socket_id: String,
    cmd_tx: mpsc::Sender<Command>,
    open: Arc<AtomicBool>,
}

impl WsConnection {
    async fn submit(&self, command: Command) -> Result<(), DeskRelayError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| DeskRelayError::transport("socket closed"))
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn socket_id(&self) -> &str {
        &self.socket_id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<(), DeskRelayError> {
        self.submit(Command::Emit {
            event: event.to_string(),
            data: payload,
            reply: None,
        })
        .await
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, DeskRelayError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Emit {
            event: event.to_string(),
            data: payload,
            reply: Some(tx),
        })
        .await?;
        rx.await
            .map_err(|_| DeskRelayError::transport("socket closed before acknowledgement"))
    }

    async fn close(&self) {
        // A full command channel or a finished handler both mean the socket is going away.
        let _ = self.cmd_tx.try_send(Command::Close);
        self.open.store(false, Ordering::SeqCst);
    }
}

async fn handler_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<InboundEvent>,
    open: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, oneshot::Sender<Value>> = HashMap::new();
    let mut next_ack: u64 = 1;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(Command::Emit { event, data, reply }) = cmd else {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                };
                let ack = reply.map(|tx| {
                    let id = next_ack;
                    next_ack += 1;
                    pending.insert(id, tx);
                    id
                });
                debug!(event = %event, ack = ?ack, "emit");
                let text = codec::encode_event(&event, &data, ack);
                if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                    warn!(error = %e, "websocket write failed");
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let WsMessage::Text(text) = msg else {
                    if matches!(msg, WsMessage::Close(_)) {
                        break;
                    }
                    continue;
                };
                match codec::decode(&text) {
                    Ok(Frame::Ack { id, data }) => {
                        if let Some(tx) = pending.remove(&id) {
                            let _ = tx.send(data);
                        }
                    }
                    Ok(Frame::Event { name, data, .. }) => {
                        if event_tx.send(InboundEvent::new(name, data)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "ignoring undecodable frame"),
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    // Dropping `pending` fails every outstanding ack; dropping `event_tx` ends the stream.
    debug!(pending_acks = pending.len(), "websocket handler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    /// Accept one client, record its Authorization header, answer the first
    /// acknowledged emit, push one event and close.
    async fn spawn_server() -> (String, oneshot::Receiver<Option<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = auth_tx.send(auth);
                resp.headers_mut()
                    .insert(SOCKET_ID_HEADER, HeaderValue::from_static("sock-42"));
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                let WsMessage::Text(text) = msg else { continue };
                if let Ok(Frame::Event {
                    ack: Some(id),
                    data,
                    ..
                }) = codec::decode(&text)
                {
                    let reply = codec::encode_ack(id, &json!({"echo": data}));
                    ws.send(WsMessage::Text(reply.into())).await.unwrap();
                    let event = codec::encode_event("messageReceived", &json!({"id": "m1"}), None);
                    ws.send(WsMessage::Text(event.into())).await.unwrap();
                    let _ = ws.close(None).await;
                    break;
                }
            }
        });

        (format!("ws://{addr}"), auth_rx)
    }

    #[tokio::test]
    async fn dial_authenticates_and_correlates_acks() {
        let (url, auth_rx) = spawn_server().await;
        let transport = WsTransport::new(url, 16);

        let Dialed {
            connection,
            mut events,
        } = transport.dial("secret").await.unwrap();
        assert_eq!(connection.socket_id(), "sock-42");
        assert_eq!(auth_rx.await.unwrap().as_deref(), Some("Bearer secret"));

        let ack = connection
            .emit_with_ack("sendMessage", json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(ack["echo"]["message"], "hi");

        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "messageReceived");
        assert_eq!(event.payload["id"], "m1");

        // Server closed: the stream ends and the handle reports closed.
        assert!(events.recv().await.is_none());
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn dial_failure_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsTransport::new(format!("ws://{addr}"), 16)
            .dial("t")
            .await
            .err()
            .unwrap();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = WsTransport::new("not a url", 16).dial("t").await.err().unwrap();
        assert!(matches!(err, DeskRelayError::Transport { .. }));
    }
}
