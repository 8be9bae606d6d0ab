use std::{sync::Arc, time::Instant};

use tokio::{sync::mpsc, task::JoinHandle};

use {
    zahra_channels::ProtocolClient,
    zahra_config::{QrRenderer, ZahraConfig},
    zahra_whatsapp::{Backoff, ExactMatchPolicy, LifecycleManager, MessageRelay, SessionHandle},
};

use crate::auth::ResolvedAuth;

/// Inbound queue depth between the lifecycle manager and the relay.
const INBOUND_QUEUE: usize = 256;

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in `Arc` for use across handlers.
pub struct GatewayState {
    pub session: SessionHandle,
    pub relay: Arc<MessageRelay>,
    pub auth: ResolvedAuth,
    pub bot_name: String,
    pub qr_renderer: QrRenderer,
    pub version: String,
    pub started_at: Instant,
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayState {
    /// Wire the session core around `client` and spawn its tasks.
    ///
    /// The session is left disconnected; call [`SessionHandle::start`] to
    /// begin establishing.
    pub fn spawn(
        client: Arc<dyn ProtocolClient>,
        config: &ZahraConfig,
        auth: ResolvedAuth,
    ) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (manager, session) = LifecycleManager::new(
            Arc::clone(&client),
            Backoff::from(&config.whatsapp.reconnect),
            config.whatsapp.connect_timeout(),
            inbound_tx,
        );
        let policy = Arc::new(ExactMatchPolicy::from_config(&config.reply));
        let relay = Arc::new(
            MessageRelay::new(client, session.clone(), config.whatsapp.send_timeout())
                .with_policy(policy),
        );

        let tasks = vec![manager.spawn(), Arc::clone(&relay).spawn_inbound(inbound_rx)];

        Arc::new(Self {
            session,
            relay,
            auth,
            bot_name: config.gateway.bot_name.clone(),
            qr_renderer: config.gateway.qr_renderer,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            tasks,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Drop for GatewayState {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
