use {
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
};

/// Where a collaborator delivers its events. Unbounded so delivery never
/// blocks on the consumer.
pub type EventSink = mpsc::UnboundedSender<ChannelEvent>;

/// Events emitted by the protocol collaborator, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A (possibly rotated) pairing code to display for scanning.
    PairingToken(String),
    /// The session is authenticated and live.
    SessionOpen { own_address: Option<String> },
    /// The session ended.
    SessionClosed { reason: DisconnectReason },
    /// A message arrived on the session.
    Inbound(InboundMessage),
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The device was unlinked by the user. Not recoverable without re-pairing.
    LoggedOut,
    ConnectionLost,
    ConnectionClosed,
    ConnectionReplaced,
    TimedOut,
    RestartRequired,
    BadSession,
    #[serde(other)]
    Unknown,
}

impl DisconnectReason {
    /// Whether the session should be re-established automatically.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::LoggedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::ConnectionLost => "connection_lost",
            Self::ConnectionClosed => "connection_closed",
            Self::ConnectionReplaced => "connection_replaced",
            Self::TimedOut => "timed_out",
            Self::RestartRequired => "restart_required",
            Self::BadSession => "bad_session",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw inbound message as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    /// Text content; `None` for media, reactions, protocol messages.
    pub body: Option<String>,
    /// Sent by this process's own account.
    pub from_me: bool,
    /// Unix seconds, when the collaborator reports one.
    pub timestamp: Option<i64>,
}
