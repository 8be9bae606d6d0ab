//! Session snapshot and its transition rules.

use {serde::Serialize, zahra_channels::ChannelEvent};

use crate::error::SessionError;

/// Connection state of the single process-wide session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    AwaitingPairing,
    Connected,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Connected => "connected",
        }
    }

    /// Two-valued status for the control surface.
    pub fn status_label(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected | Self::AwaitingPairing => "disconnected",
        }
    }

    /// Edges of the session state machine.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Disconnected | AwaitingPairing | Connected)
                | (AwaitingPairing, AwaitingPairing | Connected | Disconnected)
                | (Connected, Connected | Disconnected)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the session, published by the lifecycle manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    /// Present only while `state == AwaitingPairing`.
    pub pairing_token: Option<String>,
    pub last_error: Option<SessionError>,
    /// Our own address once connected, if the collaborator reports it.
    pub own_address: Option<String>,
}

/// What the lifecycle manager must do after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    None,
    /// A new pairing token was stored.
    PairingUpdated,
    /// A pairing token was refused (empty, or the session is connected).
    Rejected,
    Opened,
    ScheduleReconnect,
    Terminated,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// True after a logout or exhausted retries, until an operator start.
    pub fn is_terminated(&self) -> bool {
        self.last_error.as_ref().is_some_and(SessionError::is_terminal)
    }

    /// Apply a connection event in place. Inbound messages leave the session
    /// untouched, as does any close once the session is terminated.
    pub(crate) fn apply(&mut self, event: &ChannelEvent) -> Effect {
        match event {
            ChannelEvent::PairingToken(token) => {
                if token.is_empty() || self.state == SessionState::Connected {
                    return Effect::Rejected;
                }
                if self.pairing_token.as_ref() == Some(token) {
                    return Effect::None;
                }
                self.state = SessionState::AwaitingPairing;
                self.pairing_token = Some(token.clone());
                Effect::PairingUpdated
            },
            ChannelEvent::SessionOpen { own_address } => {
                self.state = SessionState::Connected;
                self.pairing_token = None;
                self.last_error = None;
                self.own_address = own_address.clone();
                Effect::Opened
            },
            ChannelEvent::SessionClosed { .. } if self.is_terminated() => Effect::None,
            ChannelEvent::SessionClosed { reason } => {
                self.state = SessionState::Disconnected;
                self.pairing_token = None;
                self.own_address = None;
                if reason.is_recoverable() {
                    self.last_error = Some(SessionError::ConnectionLost(*reason));
                    Effect::ScheduleReconnect
                } else {
                    self.last_error = Some(SessionError::SessionTerminated);
                    Effect::Terminated
                }
            },
            ChannelEvent::Inbound(_) => Effect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        proptest::prelude::*,
        zahra_channels::{DisconnectReason, InboundMessage},
    };

    #[test]
    fn pairing_then_open_clears_token() {
        let mut session = Session::default();

        session.apply(&ChannelEvent::PairingToken("XYZ".into()));
        assert_eq!(session.state, SessionState::AwaitingPairing);
        assert_eq!(session.pairing_token.as_deref(), Some("XYZ"));

        let effect = session.apply(&ChannelEvent::SessionOpen { own_address: None });
        assert_eq!(effect, Effect::Opened);
        assert_eq!(session.state, SessionState::Connected);
        assert_eq!(session.pairing_token, None);
    }

    #[test]
    fn token_rotation_replaces_token() {
        let mut session = Session::default();
        session.apply(&ChannelEvent::PairingToken("first".into()));
        session.apply(&ChannelEvent::PairingToken("second".into()));
        assert_eq!(session.pairing_token.as_deref(), Some("second"));
    }

    #[test]
    fn token_while_connected_is_ignored() {
        let mut session = Session::default();
        session.apply(&ChannelEvent::SessionOpen { own_address: None });
        session.apply(&ChannelEvent::PairingToken("late".into()));
        assert_eq!(session.state, SessionState::Connected);
        assert_eq!(session.pairing_token, None);
    }

    #[test]
    fn logout_is_terminal() {
        let mut session = Session::default();
        session.apply(&ChannelEvent::SessionOpen { own_address: None });
        let effect = session.apply(&ChannelEvent::SessionClosed {
            reason: DisconnectReason::LoggedOut,
        });
        assert_eq!(effect, Effect::Terminated);
        assert_eq!(session.state, SessionState::Disconnected);
        assert_eq!(session.last_error, Some(SessionError::SessionTerminated));
    }

    #[test]
    fn close_after_logout_keeps_termination() {
        let mut session = Session::default();
        session.apply(&ChannelEvent::SessionOpen { own_address: None });
        session.apply(&ChannelEvent::SessionClosed {
            reason: DisconnectReason::LoggedOut,
        });
        let effect = session.apply(&ChannelEvent::SessionClosed {
            reason: DisconnectReason::ConnectionLost,
        });
        assert_eq!(effect, Effect::None);
        assert_eq!(session.last_error, Some(SessionError::SessionTerminated));
    }

    #[test]
    fn repeated_token_is_not_an_update() {
        let mut session = Session::default();
        let token = ChannelEvent::PairingToken("XYZ".into());
        assert_eq!(session.apply(&token), Effect::PairingUpdated);
        assert_eq!(session.apply(&token), Effect::None);
        assert_eq!(
            session.apply(&ChannelEvent::PairingToken(String::new())),
            Effect::Rejected
        );
    }

    #[test]
    fn recoverable_close_schedules_reconnect() {
        let mut session = Session::default();
        session.apply(&ChannelEvent::PairingToken("abc".into()));
        let effect = session.apply(&ChannelEvent::SessionClosed {
            reason: DisconnectReason::TimedOut,
        });
        assert_eq!(effect, Effect::ScheduleReconnect);
        assert_eq!(session.pairing_token, None);
        assert_eq!(
            session.last_error,
            Some(SessionError::ConnectionLost(DisconnectReason::TimedOut))
        );
    }

    #[test]
    fn status_label_collapses_pairing() {
        assert_eq!(SessionState::AwaitingPairing.status_label(), "disconnected");
        assert_eq!(SessionState::Connected.status_label(), "connected");
        assert!(!SessionState::Connected.can_transition_to(SessionState::AwaitingPairing));
    }

    fn reason() -> impl Strategy<Value = DisconnectReason> {
        prop_oneof![
            Just(DisconnectReason::LoggedOut),
            Just(DisconnectReason::ConnectionLost),
            Just(DisconnectReason::TimedOut),
            Just(DisconnectReason::ConnectionReplaced),
            Just(DisconnectReason::Unknown),
        ]
    }

    fn event() -> impl Strategy<Value = ChannelEvent> {
        prop_oneof![
            "[A-Za-z0-9]{0,8}".prop_map(ChannelEvent::PairingToken),
            Just(ChannelEvent::SessionOpen { own_address: None }),
            reason().prop_map(|reason| ChannelEvent::SessionClosed { reason }),
            Just(ChannelEvent::Inbound(InboundMessage {
                sender: "62811@s.whatsapp.net".into(),
                body: Some("halo".into()),
                from_me: false,
                timestamp: None,
            })),
        ]
    }

    proptest! {
        #[test]
        fn transitions_follow_state_machine(events in prop::collection::vec(event(), 0..64)) {
            let mut session = Session::default();
            for event in &events {
                let before = session.state;
                session.apply(event);
                prop_assert!(
                    before.can_transition_to(session.state),
                    "illegal transition {before} -> {} on {event:?}", session.state
                );
                match session.state {
                    SessionState::AwaitingPairing => {
                        prop_assert!(session.pairing_token.as_deref().is_some_and(|t| !t.is_empty()));
                    },
                    SessionState::Connected | SessionState::Disconnected => {
                        prop_assert!(session.pairing_token.is_none());
                    },
                }
            }
        }

        #[test]
        fn termination_sticks_until_open(events in prop::collection::vec(event(), 0..64)) {
            let mut session = Session::default();
            session.apply(&ChannelEvent::SessionClosed { reason: DisconnectReason::LoggedOut });
            for event in &events {
                let effect = session.apply(event);
                if matches!(event, ChannelEvent::SessionOpen { .. }) {
                    break;
                }
                prop_assert_ne!(effect, Effect::ScheduleReconnect, "reconnect after logout on {:?}", event);
                prop_assert_eq!(&session.last_error, &Some(SessionError::SessionTerminated));
            }
        }
    }
}
