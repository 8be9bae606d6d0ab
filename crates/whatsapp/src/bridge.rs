//! WebSocket bridge to the WhatsApp protocol sidecar.
//!
//! The sidecar hosts the multi-device library and persists its credentials
//! under `auth_dir`. We speak JSON text frames:
//!
//! client -> bridge: `connect`, `send`
//! bridge -> client: `qr`, `open`, `close`, `message`, `send_result`

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    dashmap::DashMap,
    futures::{SinkExt, StreamExt},
    serde::{Deserialize, Serialize},
    tokio::{
        sync::{Mutex, mpsc, oneshot},
        task::JoinHandle,
    },
    tokio_tungstenite::tungstenite::Message,
    tracing::{debug, info, warn},
    zahra_channels::{
        ChannelEvent, DisconnectReason, EventSink, InboundMessage, MessageAck, ProtocolClient,
    },
};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Connect {
        auth_dir: &'a str,
    },
    Send {
        id: &'a str,
        to: &'a str,
        text: &'a str,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeFrame {
    Qr {
        code: String,
    },
    Open {
        #[serde(default)]
        jid: Option<String>,
    },
    Close {
        #[serde(default = "unknown_reason")]
        reason: DisconnectReason,
    },
    Message {
        from: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        from_me: bool,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    SendResult {
        id: String,
        ok: bool,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

fn unknown_reason() -> DisconnectReason {
    DisconnectReason::Unknown
}

struct PendingSend {
    to: String,
    tx: oneshot::Sender<Result<MessageAck, String>>,
}

type PendingSends = Arc<DashMap<String, PendingSend>>;

/// Removes a pending send when the caller stops waiting (timeout, drop).
struct PendingGuard<'a> {
    pending: &'a PendingSends,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// [`ProtocolClient`] backed by the WebSocket bridge.
pub struct BridgeClient {
    url: String,
    auth_dir: String,
    /// Bumped on every establish; readers of older sockets go quiet.
    generation: Arc<AtomicU64>,
    conn: Mutex<Option<Connection>>,
    pending: PendingSends,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("url", &self.url)
            .field("auth_dir", &self.auth_dir)
            .field("pending_sends", &self.pending.len())
            .finish()
    }
}

impl BridgeClient {
    pub fn new(url: impl Into<String>, auth_dir: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_dir: auth_dir.into(),
            generation: Arc::new(AtomicU64::new(0)),
            conn: Mutex::new(None),
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn from_config(cfg: &zahra_config::WhatsAppConfig) -> Self {
        Self::new(cfg.bridge_url.clone(), cfg.auth_dir.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            conn.abort();
        }
    }
}

#[async_trait]
impl ProtocolClient for BridgeClient {
    fn id(&self) -> &str {
        "bridge"
    }

    async fn establish_session(&self, events: EventSink) -> Result<()> {
        let (ws, _resp) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("failed to connect to bridge at {}", self.url))?;
        let (mut sink, stream) = ws.split();

        let connect = serde_json::to_string(&ClientFrame::Connect {
            auth_dir: &self.auth_dir,
        })?;
        sink.send(Message::text(connect))
            .await
            .context("failed to send connect frame")?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        fail_pending(&self.pending, "bridge connection replaced");

        let (outbound, mut rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!(error = %e, "bridge write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });
        let reader = tokio::spawn(read_loop(
            stream,
            events,
            Arc::clone(&self.pending),
            Arc::clone(&self.generation),
            generation,
        ));

        let previous = self.conn.lock().await.replace(Connection {
            outbound,
            reader,
            writer,
        });
        if let Some(old) = previous {
            debug!("replacing previous bridge connection");
            old.abort();
        }

        info!(url = %self.url, generation, "connected to bridge");
        Ok(())
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<MessageAck> {
        let outbound = self
            .conn
            .lock()
            .await
            .as_ref()
            .map(|c| c.outbound.clone())
            .context("bridge not connected")?;

        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), PendingSend {
            to: to.to_string(),
            tx,
        });
        let _guard = PendingGuard {
            pending: &self.pending,
            id: &id,
        };

        let frame = serde_json::to_string(&ClientFrame::Send {
            id: &id,
            to,
            text: body,
        })?;
        if outbound.send(Message::text(frame)).is_err() {
            bail!("bridge writer closed");
        }

        match rx.await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(reason)) => bail!("bridge rejected send: {reason}"),
            Err(_) => bail!("bridge dropped the send before acknowledging it"),
        }
    }
}

fn fail_pending(pending: &PendingSends, reason: &str) {
    let ids: Vec<String> = pending.iter().map(|e| e.key().clone()).collect();
    for id in ids {
        if let Some((_, send)) = pending.remove(&id) {
            let _ = send.tx.send(Err(reason.to_string()));
        }
    }
}

async fn read_loop<S>(
    mut stream: S,
    events: EventSink,
    pending: PendingSends,
    current: Arc<AtomicU64>,
    generation: u64,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let is_current = || current.load(Ordering::SeqCst) == generation;
    let mut close_reported = false;

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "bridge read failed");
                break;
            },
        };
        if !is_current() {
            return;
        }
        let frame: BridgeFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "ignoring malformed bridge frame");
                continue;
            },
        };
        let Some(event) = dispatch(frame, &pending) else {
            continue;
        };
        close_reported |= matches!(event, ChannelEvent::SessionClosed { .. });
        if events.send(event).is_err() {
            debug!("event sink closed, stopping bridge reader");
            return;
        }
    }

    if is_current() {
        fail_pending(&pending, "bridge connection lost");
        if !close_reported {
            let _ = events.send(ChannelEvent::SessionClosed {
                reason: DisconnectReason::ConnectionLost,
            });
        }
    }
}

/// Map a bridge frame to a collaborator event. Send results resolve their
/// pending request instead.
fn dispatch(frame: BridgeFrame, pending: &PendingSends) -> Option<ChannelEvent> {
    match frame {
        BridgeFrame::Qr { code } => Some(ChannelEvent::PairingToken(code)),
        BridgeFrame::Open { jid } => Some(ChannelEvent::SessionOpen { own_address: jid }),
        BridgeFrame::Close { reason } => Some(ChannelEvent::SessionClosed { reason }),
        BridgeFrame::Message {
            from,
            text,
            from_me,
            timestamp,
        } => Some(ChannelEvent::Inbound(InboundMessage {
            sender: from,
            body: text,
            from_me,
            timestamp,
        })),
        BridgeFrame::SendResult {
            id,
            ok,
            message_id,
            error,
        } => {
            let Some((_, send)) = pending.remove(&id) else {
                debug!(id = %id, "send result for unknown request");
                return None;
            };
            let outcome = if ok {
                Ok(MessageAck {
                    id: message_id.unwrap_or(id),
                    to: send.to,
                })
            } else {
                Err(error.unwrap_or_else(|| "unknown error".into()))
            };
            let _ = send.tx.send(outcome);
            None
        },
    }
}
