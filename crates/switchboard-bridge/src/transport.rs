// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Transport`] implementation over a WebSocket to the protocol engine.
//!
//! One socket per session at `<bridge_url>/sessions/<session_id>`. A
//! connection task owns the socket: it writes queued request frames, routes
//! `result` frames to waiting callers by request id, and publishes every
//! other frame as a [`TransportEvent`]. Losing the socket is reported as a
//! transient close so the session reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_config::model::TransportConfig;
use switchboard_core::types::{
    CloseReason, ConnectionUpdate, Credentials, InboundEvent, OutboundContent, SendReceipt,
    TransportEvent,
};
use switchboard_core::{EventFanout, SessionId, SwitchboardError, Transport, TransportHandle};

use crate::frame::{ClientFrame, EngineFrame, RequestResult, WireContent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = DashMap<u64, oneshot::Sender<RequestResult>>;

/// Factory for bridge connections.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    base_url: String,
    request_timeout: Duration,
}

impl BridgeTransport {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.bridge_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn session_url(&self, session_id: &SessionId) -> String {
        format!(
            "{}/sessions/{}",
            self.base_url.trim_end_matches('/'),
            session_id
        )
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn initialize(
        &self,
        session_id: &SessionId,
        credentials: Option<Credentials>,
    ) -> Result<Arc<dyn TransportHandle>, SwitchboardError> {
        let url = self.session_url(session_id);
        let (mut ws, _) = tokio::time::timeout(self.request_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SwitchboardError::Timeout {
                duration: self.request_timeout,
            })?
            .map_err(|e| SwitchboardError::Transport {
                message: format!("cannot connect to {url}"),
                source: Some(Box::new(e)),
            })?;

        write_frame(&mut ws, &ClientFrame::Init { credentials }).await?;
        debug!(%session_id, %url, "bridge socket open");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let handle = Arc::new(BridgeHandle {
            session_id: session_id.clone(),
            commands,
            pending: Arc::new(DashMap::new()),
            fanout: Arc::new(EventFanout::new()),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            request_timeout: self.request_timeout,
        });

        tokio::spawn(connection_loop(
            session_id.clone(),
            ws,
            command_rx,
            handle.pending.clone(),
            handle.fanout.clone(),
            handle.cancel.clone(),
        ));
        Ok(handle)
    }
}

/// A live bridge connection.
pub struct BridgeHandle {
    session_id: SessionId,
    commands: mpsc::UnboundedSender<ClientFrame>,
    pending: Arc<Pending>,
    fanout: Arc<EventFanout>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    request_timeout: Duration,
}

impl BridgeHandle {
    async fn request(
        &self,
        build: impl FnOnce(u64) -> ClientFrame,
    ) -> Result<RequestResult, SwitchboardError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if self.commands.send(build(id)).is_err() {
            self.pending.remove(&id);
            return Err(SwitchboardError::transport("bridge connection closed"));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result.into_result(),
            Ok(Err(_)) => Err(SwitchboardError::transport(
                "bridge connection closed before reply",
            )),
            Err(_) => {
                self.pending.remove(&id);
                Err(SwitchboardError::Timeout {
                    duration: self.request_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl TransportHandle for BridgeHandle {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.fanout.subscribe()
    }

    async fn send(
        &self,
        jid: &str,
        content: &OutboundContent,
    ) -> Result<SendReceipt, SwitchboardError> {
        let content = WireContent::from_outbound(content).await?;
        let jid = jid.to_string();
        let result = self
            .request(|id| ClientFrame::Send { id, jid, content })
            .await?;
        let message_id = result
            .message_id
            .ok_or_else(|| SwitchboardError::transport("send result without message id"))?;
        Ok(SendReceipt { message_id })
    }

    async fn fetch_media(&self, event: &InboundEvent) -> Result<Vec<u8>, SwitchboardError> {
        let message = event.clone();
        let result = self
            .request(|id| ClientFrame::FetchMedia { id, message })
            .await?;
        result.decode_data()
    }

    async fn logout(&self) -> Result<(), SwitchboardError> {
        self.request(|id| ClientFrame::Logout { id }).await?;
        info!(session_id = %self.session_id, "engine confirmed logout");
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_frame(ws: &mut WsStream, frame: &ClientFrame) -> Result<(), SwitchboardError> {
    let text = serde_json::to_string(frame).map_err(|e| SwitchboardError::Internal(e.to_string()))?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: "bridge write failed".to_string(),
            source: Some(Box::new(e)),
        })
}

/// Owns the socket until it drops or the handle is closed.
async fn connection_loop(
    session_id: SessionId,
    ws: WsStream,
    mut commands: mpsc::UnboundedReceiver<ClientFrame>,
    pending: Arc<Pending>,
    fanout: Arc<EventFanout>,
    cancel: CancellationToken,
) {
    let (mut sink, mut stream) = ws.split();
    let mut close_code: Option<u16> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                debug!(%session_id, "bridge socket closed locally");
                pending.clear();
                return;
            }
            command = commands.recv() => {
                let Some(frame) = command else { break };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%session_id, error = %e, "unserializable frame dropped");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(%session_id, error = %e, "bridge write failed");
                    break;
                }
            }
            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!(%session_id, error = %e, "bridge read failed");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => route(&session_id, &text, &pending, &fanout),
                    Message::Close(frame) => {
                        close_code = frame.map(|f| u16::from(f.code));
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Waiting callers see their reply channel close.
    pending.clear();
    warn!(%session_id, code = ?close_code, "bridge socket lost");
    fanout.publish(TransportEvent::ConnectionUpdate(ConnectionUpdate::closed(
        CloseReason::Lost {
            status_code: close_code,
        },
    )));
}

fn route(session_id: &SessionId, text: &str, pending: &Pending, fanout: &EventFanout) {
    let frame: EngineFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%session_id, error = %e, "unparseable engine frame");
            return;
        }
    };
    match frame {
        EngineFrame::Result(result) => match pending.remove(&result.id) {
            Some((_, waiter)) => {
                let _ = waiter.send(result);
            }
            None => debug!(%session_id, id = result.id, "late or unknown result dropped"),
        },
        EngineFrame::ConnectionUpdate(update) => {
            fanout.publish(TransportEvent::ConnectionUpdate(update))
        }
        EngineFrame::Message(event) => fanout.publish(TransportEvent::Message(event)),
        EngineFrame::CredsUpdate { credentials } => {
            fanout.publish(TransportEvent::CredentialsUpdated(credentials))
        }
    }
}
