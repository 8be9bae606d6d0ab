use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::events::EventSink;

/// Core collaborator trait. The messaging-protocol client implements this.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Collaborator identifier (e.g. "bridge").
    fn id(&self) -> &str;

    /// Begin establishing a session. Returns once the attempt is under way;
    /// progress (pairing tokens, open, close) is reported through `events`.
    async fn establish_session(&self, events: EventSink) -> Result<()>;

    /// Send a text message to a fully-qualified address.
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageAck>;
}

/// Delivery acknowledgement for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    /// Network-assigned message id.
    pub id: String,
    /// Address the message was delivered to.
    pub to: String,
}
