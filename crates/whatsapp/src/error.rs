use std::time::Duration;

use zahra_channels::DisconnectReason;

/// Why an outbound send was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("whatsapp session is not connected")]
    NotConnected,
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    #[error("{0}")]
    Transport(String),
    #[error("no acknowledgement within {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Last error recorded on the session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The account logged out. No reconnect until an operator restarts.
    #[error("session terminated by logout")]
    SessionTerminated,
    #[error("session establishment failed: {0}")]
    EstablishFailed(String),
    #[error("connection lost: {0}")]
    ConnectionLost(DisconnectReason),
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl SessionError {
    /// Terminal errors stop automatic reconnection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionTerminated | Self::RetriesExhausted { .. })
    }
}
