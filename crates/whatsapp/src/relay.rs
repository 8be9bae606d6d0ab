//! Outbound sends and inbound reply handling, gated on the session state.

use std::{sync::Arc, time::Duration};

use {
    tokio::{sync::mpsc, task::JoinHandle, time::timeout},
    tracing::{debug, info, warn},
    zahra_channels::{MessageAck, ProtocolClient},
};

use crate::{
    error::{DeliveryFailure, SendError},
    lifecycle::SessionHandle,
    message::{InboundEvent, OutboundRequest, normalize_recipient},
    reply::{NoReply, ReplyPolicy},
};

pub struct MessageRelay {
    client: Arc<dyn ProtocolClient>,
    session: SessionHandle,
    send_timeout: Duration,
    policy: Arc<dyn ReplyPolicy>,
}

impl MessageRelay {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        session: SessionHandle,
        send_timeout: Duration,
    ) -> Self {
        Self {
            client,
            session,
            send_timeout,
            policy: Arc::new(NoReply),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ReplyPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Send one text message.
    ///
    /// Fails with [`SendError::NotConnected`] before touching the collaborator
    /// unless the session is connected. The collaborator call is bounded by
    /// the configured send timeout.
    pub async fn send(&self, req: &OutboundRequest) -> Result<MessageAck, SendError> {
        if !self.session.is_connected() {
            return Err(SendError::NotConnected);
        }
        let to = normalize_recipient(&req.recipient)?;

        match timeout(self.send_timeout, self.client.send_message(&to, &req.body)).await {
            Ok(Ok(ack)) => {
                debug!(to = %ack.to, id = %ack.id, "message sent");
                Ok(ack)
            },
            Ok(Err(e)) => {
                warn!(to = %to, error = %e, "send failed");
                Err(DeliveryFailure::Transport(e.to_string()).into())
            },
            Err(_) => {
                warn!(
                    to = %to,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "send timed out"
                );
                Err(DeliveryFailure::Timeout(self.send_timeout).into())
            },
        }
    }

    /// Log an inbound message and answer it if the reply policy says so.
    pub async fn on_inbound(&self, event: InboundEvent) {
        info!(sender = %event.sender, body = %event.body, "inbound message");

        let Some(reply) = self.policy.reply(&event) else {
            return;
        };
        let req = OutboundRequest::new(event.sender, reply);
        if let Err(e) = self.send(&req).await {
            warn!(to = %req.recipient, error = %e, "auto-reply failed");
        }
    }

    /// Drain the inbound queue in order until it closes.
    pub fn spawn_inbound(self: Arc<Self>, mut rx: mpsc::Receiver<InboundEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.on_inbound(event).await;
            }
            debug!("inbound queue closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            backoff::Backoff,
            lifecycle::LifecycleManager,
            reply::ExactMatchPolicy,
            testing::{MockClient, SendBehavior},
        },
        chrono::Utc,
        zahra_channels::ChannelEvent,
    };

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Relay wired to a running manager; optionally already connected.
    async fn relay(
        connected: bool,
    ) -> (Arc<MockClient>, MessageRelay, mpsc::Receiver<InboundEvent>) {
        let client = MockClient::new();
        let (tx, rx) = mpsc::channel(16);
        let (manager, handle) =
            LifecycleManager::new(client.clone(), Backoff::default(), Duration::from_secs(5), tx);
        manager.spawn();
        if connected {
            handle
                .event_sink()
                .send(ChannelEvent::SessionOpen { own_address: None })
                .unwrap();
            settle().await;
            assert!(handle.is_connected());
        }
        let relay = MessageRelay::new(client.clone(), handle, Duration::from_secs(3)).with_policy(
            Arc::new(ExactMatchPolicy::new(false).rule("halo", "Halo juga!")),
        );
        (client, relay, rx)
    }

    fn inbound(sender: &str, body: &str) -> InboundEvent {
        InboundEvent {
            sender: sender.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_connection() {
        let (client, relay, _rx) = relay(false).await;
        let err = relay
            .send(&OutboundRequest::new("6281234567890", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err, SendError::NotConnected);
        assert!(client.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_recipient_is_invalid() {
        let (client, relay, _rx) = relay(true).await;
        let err = relay.send(&OutboundRequest::new("", "hi")).await.unwrap_err();
        assert!(matches!(err, SendError::InvalidRecipient(_)));
        assert!(client.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_normalizes_number() {
        let (client, relay, _rx) = relay(true).await;
        let ack = relay
            .send(&OutboundRequest::new("+62 812 3456 7890", "hi"))
            .await
            .unwrap();
        assert_eq!(ack.to, "6281234567890@s.whatsapp.net");
        assert_eq!(client.sent(), vec![(
            "6281234567890@s.whatsapp.net".to_string(),
            "hi".to_string()
        )]);
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out() {
        let (client, relay, _rx) = relay(true).await;
        client.set_send_behavior(SendBehavior::Hang);
        let err = relay
            .send(&OutboundRequest::new("6281234567890", "hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SendError::DeliveryFailed(DeliveryFailure::Timeout(Duration::from_secs(3)))
        );
        assert_eq!(client.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_reported() {
        let (client, relay, _rx) = relay(true).await;
        client.set_send_behavior(SendBehavior::Fail("socket closed".into()));
        let err = relay
            .send(&OutboundRequest::new("6281234567890", "hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SendError::DeliveryFailed(DeliveryFailure::Transport("socket closed".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_trigger_replies_to_sender() {
        let (client, relay, _rx) = relay(true).await;
        relay
            .on_inbound(inbound("6281111111111@s.whatsapp.net", "HALO"))
            .await;
        relay
            .on_inbound(inbound("6281111111111@s.whatsapp.net", "apa kabar"))
            .await;
        assert_eq!(client.sent(), vec![(
            "6281111111111@s.whatsapp.net".to_string(),
            "Halo juga!".to_string()
        )]);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_while_disconnected_sends_nothing() {
        let (client, relay, _rx) = relay(false).await;
        relay
            .on_inbound(inbound("6281111111111@s.whatsapp.net", "halo"))
            .await;
        assert!(client.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_queue_end_to_end() {
        let (client, relay, rx) = relay(true).await;
        let relay = Arc::new(relay);
        let task = Arc::clone(&relay).spawn_inbound(rx);

        relay
            .session
            .event_sink()
            .send(ChannelEvent::Inbound(zahra_channels::InboundMessage {
                sender: "6282222222222@s.whatsapp.net".into(),
                body: Some("halo".into()),
                from_me: false,
                timestamp: Some(1_700_000_000),
            }))
            .unwrap();
        settle().await;

        assert_eq!(client.sent().len(), 1);
        assert_eq!(client.sent()[0].0, "6282222222222@s.whatsapp.net");
        task.abort();
    }
}
