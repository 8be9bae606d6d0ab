//! In-memory protocol collaborator for tests.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    zahra_channels::{ChannelEvent, EventSink, MessageAck, ProtocolClient},
};

/// How [`MockClient::send_message`] behaves.
#[derive(Debug, Clone, Default)]
pub enum SendBehavior {
    #[default]
    Ack,
    Fail(String),
    /// Never completes.
    Hang,
}

/// Records calls and lets tests inject collaborator events.
#[derive(Default)]
pub struct MockClient {
    establish_calls: AtomicUsize,
    fail_establish: AtomicBool,
    sink: Mutex<Option<EventSink>>,
    sent: Mutex<Vec<(String, String)>>,
    send_behavior: Mutex<SendBehavior>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn establish_calls(&self) -> usize {
        self.establish_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_establish(&self, fail: bool) {
        self.fail_establish.store(fail, Ordering::SeqCst);
    }

    pub fn set_send_behavior(&self, behavior: SendBehavior) {
        *lock(&self.send_behavior) = behavior;
    }

    /// Messages passed to `send_message`, as `(to, body)`.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    /// Deliver an event through the sink from the last establish call.
    pub fn emit(&self, event: ChannelEvent) -> bool {
        lock(&self.sink)
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    fn id(&self) -> &str {
        "mock"
    }

    async fn establish_session(&self, events: EventSink) -> Result<()> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_establish.load(Ordering::SeqCst) {
            bail!("mock establish failure");
        }
        *lock(&self.sink) = Some(events);
        Ok(())
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<MessageAck> {
        lock(&self.sent).push((to.to_string(), body.to_string()));
        let behavior = lock(&self.send_behavior).clone();
        match behavior {
            SendBehavior::Ack => Ok(MessageAck {
                id: format!("mock-{}", lock(&self.sent).len()),
                to: to.to_string(),
            }),
            SendBehavior::Fail(reason) => bail!(reason),
            SendBehavior::Hang => std::future::pending().await,
        }
    }
}
