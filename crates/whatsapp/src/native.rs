//! In-process WhatsApp multi-device client built on `whatsapp-rust`.
//!
//! Credentials live in a SQLite store under `auth_dir`, so a restarted
//! process resumes the linked device without a new QR scan.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    tokio::{
        sync::{Mutex, OnceCell},
        task::JoinHandle,
    },
    tracing::{debug, info},
    wacore::{proto_helpers::MessageExt, types::events::Event},
    wacore_binary::jid::Jid,
    waproto::whatsapp as wa,
    whatsapp_rust::{bot::Bot, client::Client},
    whatsapp_rust_sqlite_storage::SqliteStore,
    whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory,
    whatsapp_rust_ureq_http_client::UreqHttpClient,
    zahra_channels::{
        ChannelEvent, DisconnectReason, EventSink, InboundMessage, MessageAck, ProtocolClient,
    },
};

const STORE_FILE: &str = "whatsapp.db";

/// [`ProtocolClient`] running the WhatsApp protocol inside this process.
pub struct NativeClient {
    auth_dir: PathBuf,
    store: OnceCell<Arc<SqliteStore>>,
    /// Client of the current bot, captured once it reports a connection.
    client: Arc<Mutex<Option<Arc<Client>>>>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl NativeClient {
    pub fn new(auth_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_dir: auth_dir.into(),
            store: OnceCell::new(),
            client: Arc::new(Mutex::new(None)),
            runner: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &zahra_config::WhatsAppConfig) -> Self {
        Self::new(&cfg.auth_dir)
    }

    fn store_path(&self) -> PathBuf {
        self.auth_dir.join(STORE_FILE)
    }

    async fn store(&self) -> Result<Arc<SqliteStore>> {
        let store = self
            .store
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.auth_dir)
                    .await
                    .with_context(|| format!("failed to create {}", self.auth_dir.display()))?;
                let path = self.store_path();
                let store = SqliteStore::new(&path.to_string_lossy())
                    .await
                    .map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
                Ok::<_, anyhow::Error>(Arc::new(store))
            })
            .await?;
        Ok(Arc::clone(store))
    }
}

impl Drop for NativeClient {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.get_mut().take() {
            runner.abort();
        }
    }
}

#[async_trait]
impl ProtocolClient for NativeClient {
    fn id(&self) -> &str {
        "native"
    }

    async fn establish_session(&self, events: EventSink) -> Result<()> {
        let backend = self.store().await?;
        *self.client.lock().await = None;

        let slot = Arc::clone(&self.client);
        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let events = events.clone();
                let slot = Arc::clone(&slot);
                async move {
                    if matches!(event, Event::Connected(_)) {
                        *slot.lock().await = Some(client);
                    }
                    if let Some(event) = map_event(&event) {
                        let _ = events.send(event);
                    }
                }
            })
            .build()
            .await
            .map_err(|e| anyhow!("failed to build whatsapp client: {e}"))?;

        let runner = bot
            .run()
            .await
            .map_err(|e| anyhow!("failed to start whatsapp client: {e}"))?;
        if let Some(old) = self.runner.lock().await.replace(runner) {
            debug!("replacing previous whatsapp client");
            old.abort();
        }

        info!(store = %self.store_path().display(), "whatsapp client started");
        Ok(())
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<MessageAck> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .context("whatsapp client not connected")?;
        let jid: Jid = to
            .parse()
            .map_err(|e| anyhow!("invalid address {to}: {e}"))?;
        let message = wa::Message {
            conversation: Some(body.to_string()),
            ..Default::default()
        };

        let id = client
            .send_message(jid, message)
            .await
            .map_err(|e| anyhow!("{e}"))?;
        Ok(MessageAck {
            id,
            to: to.to_string(),
        })
    }
}

/// Translate a library event into a collaborator event; others are dropped.
fn map_event(event: &Event) -> Option<ChannelEvent> {
    let mapped = match event {
        Event::PairingQrCode { code, .. } => ChannelEvent::PairingToken(code.clone()),
        Event::Connected(_) => ChannelEvent::SessionOpen { own_address: None },
        Event::LoggedOut(_) => ChannelEvent::SessionClosed {
            reason: DisconnectReason::LoggedOut,
        },
        Event::StreamReplaced(_) => ChannelEvent::SessionClosed {
            reason: DisconnectReason::ConnectionReplaced,
        },
        Event::Disconnected(_) => ChannelEvent::SessionClosed {
            reason: DisconnectReason::ConnectionLost,
        },
        Event::Message(message, info) => ChannelEvent::Inbound(InboundMessage {
            sender: info.source.sender.to_string(),
            body: message.text_content().map(str::to_string),
            from_me: info.source.is_from_me,
            timestamp: Some(info.timestamp.timestamp()),
        }),
        _ => return None,
    };
    Some(mapped)
}
