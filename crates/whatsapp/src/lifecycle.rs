//! Connection lifecycle manager.
//!
//! Owns the single session. Collaborator events, operator commands and the
//! reconnect timer are all consumed by one loop, so session mutations are
//! serialized and at most one establishment is ever in flight. Readers get
//! snapshots through a [`watch`] channel and never block the loop.

use std::{sync::Arc, time::Duration};

use {
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
        time::{Instant, sleep_until, timeout},
    },
    tracing::{debug, info, warn},
    zahra_channels::{ChannelEvent, EventSink, InboundMessage, ProtocolClient},
};

use crate::{
    backoff::Backoff,
    error::SessionError,
    message::InboundEvent,
    session::{Effect, Session, SessionState},
};

enum Command {
    Start,
}

/// Cloneable handle for reading the session and requesting a start.
#[derive(Clone)]
pub struct SessionHandle {
    state: watch::Receiver<Session>,
    commands: mpsc::UnboundedSender<Command>,
    events: EventSink,
}

impl SessionHandle {
    /// Request session establishment. Idempotent: ignored while a session
    /// is active, being established, or a reconnect is already scheduled.
    /// After a logout this is the operator action that re-enables the session.
    pub fn start(&self) {
        if self.commands.send(Command::Start).is_err() {
            warn!("session start requested but lifecycle manager is not running");
        }
    }

    /// Consistent snapshot of the session. Never blocks event delivery.
    pub fn current_state(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Sink feeding the manager's event queue, for injecting events.
    pub fn event_sink(&self) -> EventSink {
        self.events.clone()
    }
}

/// Single writer of the [`Session`].
pub struct LifecycleManager {
    client: Arc<dyn ProtocolClient>,
    backoff: Backoff,
    connect_timeout: Duration,
    state: watch::Sender<Session>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: EventSink,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    inbound: mpsc::Sender<InboundEvent>,
    /// Set when an establish call returned: deadline for the collaborator's
    /// first event.
    establishing: Option<Instant>,
    /// Establish attempts since the last successful open.
    attempts: u32,
    retry_at: Option<Instant>,
}

impl LifecycleManager {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        backoff: Backoff,
        connect_timeout: Duration,
        inbound: mpsc::Sender<InboundEvent>,
    ) -> (Self, SessionHandle) {
        let (state, state_rx) = watch::channel(Session::default());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            state: state_rx,
            commands: commands_tx,
            events: events_tx.clone(),
        };
        let manager = Self {
            client,
            backoff,
            connect_timeout,
            state,
            commands,
            events_tx,
            events,
            inbound,
            establishing: None,
            attempts: 0,
            retry_at: None,
        };
        (manager, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        info!(client = self.client.id(), "lifecycle manager started");
        loop {
            let retry_at = self.retry_at;
            let establish_deadline = self.establishing;
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Start) => self.on_start(),
                    None => break,
                },
                () = wait_until(retry_at) => {
                    self.retry_at = None;
                    self.establish().await;
                },
                () = wait_until(establish_deadline) => self.on_silent_collaborator(),
            }
        }
        debug!("lifecycle manager stopped");
    }

    fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    fn publish(&self, session: Session) {
        self.state.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            *current = session;
            true
        });
    }

    fn on_start(&mut self) {
        let mut session = self.session();
        if session.state != SessionState::Disconnected || self.establishing.is_some() {
            debug!(state = %session.state, "start ignored, session already active");
            return;
        }
        if self.retry_at.is_some() {
            debug!("start ignored, reconnect already scheduled");
            return;
        }
        if session.is_terminated() {
            info!("operator restart after terminal disconnect");
            session.last_error = None;
            self.publish(session);
        }
        self.attempts = 0;
        self.retry_at = Some(Instant::now());
    }

    async fn establish(&mut self) {
        self.attempts += 1;
        let attempt = self.attempts;
        debug!(attempt, "establishing session");

        let result = timeout(
            self.connect_timeout,
            self.client.establish_session(self.events_tx.clone()),
        )
        .await;

        let error = match result {
            Ok(Ok(())) => {
                self.establishing = Some(Instant::now() + self.connect_timeout);
                info!(attempt, "session establishment under way");
                return;
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", self.connect_timeout.as_secs()),
        };

        self.establish_failed(attempt, error);
    }

    fn establish_failed(&mut self, attempt: u32, error: String) {
        warn!(attempt, error = %error, "session establishment failed");
        let mut session = self.session();
        session.last_error = Some(SessionError::EstablishFailed(error));
        self.publish(session);
        self.schedule_retry();
    }

    /// The collaborator accepted the establish call but never reported back.
    fn on_silent_collaborator(&mut self) {
        self.establishing = None;
        self.establish_failed(
            self.attempts,
            format!(
                "no session event within {}s",
                self.connect_timeout.as_secs()
            ),
        );
    }

    fn schedule_retry(&mut self) {
        if self.retry_at.is_some() {
            return;
        }
        if !self.backoff.allows(self.attempts) {
            warn!(attempts = self.attempts, "reconnect attempts exhausted");
            let mut session = self.session();
            session.last_error = Some(SessionError::RetriesExhausted {
                attempts: self.attempts,
            });
            self.publish(session);
            return;
        }
        let delay = self.backoff.delay(self.attempts);
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.attempts + 1,
            "reconnect scheduled"
        );
        self.retry_at = Some(Instant::now() + delay);
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        if let ChannelEvent::Inbound(msg) = event {
            self.forward_inbound(msg);
            return;
        }

        let awaited = self.establishing.take().is_some();
        let mut session = self.session();
        if let ChannelEvent::SessionClosed { reason } = &event
            && session.state == SessionState::Disconnected
            && !awaited
        {
            debug!(%reason, "close for an already disconnected session ignored");
            return;
        }

        let before = session.state;
        let effect = session.apply(&event);
        let after = session.state;
        self.publish(session);

        match effect {
            Effect::None => debug!(state = %after, "session event had no effect"),
            Effect::PairingUpdated => info!("pairing code updated, ready to scan"),
            Effect::Rejected => warn!(state = %after, "pairing token ignored"),
            Effect::Opened => {
                self.attempts = 0;
                self.retry_at = None;
                info!(from = %before, "whatsapp connected");
            },
            Effect::ScheduleReconnect => {
                if let ChannelEvent::SessionClosed { reason } = &event {
                    info!(from = %before, %reason, reconnect = true, "disconnected");
                }
                self.schedule_retry();
            },
            Effect::Terminated => {
                self.retry_at = None;
                warn!(from = %before, reconnect = false, "logged out, session terminated");
            },
        }
    }

    fn forward_inbound(&self, msg: InboundMessage) {
        let Some(event) = InboundEvent::from_message(msg) else {
            return;
        };
        if let Err(e) = self.inbound.try_send(event) {
            warn!(error = %e, "inbound queue unavailable, dropping message");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
