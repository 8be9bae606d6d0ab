use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    zahra_channels::InboundMessage,
};

use crate::error::SendError;

/// Address suffix for personal accounts.
pub const USER_DOMAIN: &str = "s.whatsapp.net";

/// Address domains accepted verbatim.
const KNOWN_DOMAINS: &[&str] = &[USER_DOMAIN, "g.us", "lid"];

/// Shortest/longest phone number accepted (E.164 caps at 15 digits).
const MIN_DIGITS: usize = 6;
const MAX_DIGITS: usize = 15;

/// A message to send. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub recipient: String,
    pub body: String,
}

impl OutboundRequest {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
        }
    }
}

/// A text message received from someone other than ourselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Keep only text messages from other accounts.
    pub fn from_message(msg: InboundMessage) -> Option<Self> {
        if msg.from_me {
            return None;
        }
        let body = msg.body?;
        let received_at = msg
            .timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);
        Some(Self {
            sender: msg.sender,
            body,
            received_at,
        })
    }
}

/// Turn a user-supplied recipient into a full address.
///
/// Bare numbers (`+62 811-2345`) become `628112345@s.whatsapp.net`; full
/// addresses on a known domain pass through unchanged.
pub fn normalize_recipient(raw: &str) -> Result<String, SendError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SendError::InvalidRecipient("recipient is empty".into()));
    }

    if let Some((user, domain)) = raw.split_once('@') {
        if !KNOWN_DOMAINS.contains(&domain) {
            return Err(SendError::InvalidRecipient(format!(
                "unsupported address domain '{domain}'"
            )));
        }
        let valid_user = !user.is_empty()
            && user
                .chars()
                .all(|c| c.is_ascii_digit() || c == '-' || c == ':');
        if !valid_user {
            return Err(SendError::InvalidRecipient(format!(
                "malformed address '{raw}'"
            )));
        }
        return Ok(raw.to_string());
    }

    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SendError::InvalidRecipient(format!(
            "'{raw}' is not a phone number"
        )));
    }
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err(SendError::InvalidRecipient(format!(
            "phone number must have {MIN_DIGITS}-{MAX_DIGITS} digits"
        )));
    }
    Ok(format!("{digits}@{USER_DOMAIN}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_get_user_domain() {
        assert_eq!(
            normalize_recipient("6281234567890").unwrap(),
            "6281234567890@s.whatsapp.net"
        );
        assert_eq!(
            normalize_recipient(" +62 812-3456 (7890) ").unwrap(),
            "6281234567890@s.whatsapp.net"
        );
    }

    #[test]
    fn full_addresses_pass_through() {
        for addr in [
            "6281234567890@s.whatsapp.net",
            "120363025246125888@g.us",
            "6281234-1600000000@g.us",
            "6281234567890:12@s.whatsapp.net",
            "100000000000001@lid",
        ] {
            assert_eq!(normalize_recipient(addr).unwrap(), addr);
        }
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "",
            "   ",
            "abc",
            "12345",
            "1234567890123456",
            "@s.whatsapp.net",
            "62811@example.com",
            "62 811 abc@s.whatsapp.net",
        ] {
            assert!(
                matches!(normalize_recipient(bad), Err(SendError::InvalidRecipient(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn inbound_filters_own_and_non_text() {
        let base = InboundMessage {
            sender: "62811@s.whatsapp.net".into(),
            body: Some("halo".into()),
            from_me: false,
            timestamp: Some(1_700_000_000),
        };

        let event = InboundEvent::from_message(base.clone()).unwrap();
        assert_eq!(event.body, "halo");
        assert_eq!(event.received_at.timestamp(), 1_700_000_000);

        assert!(
            InboundEvent::from_message(InboundMessage {
                from_me: true,
                ..base.clone()
            })
            .is_none()
        );
        assert!(InboundEvent::from_message(InboundMessage { body: None, ..base }).is_none());
    }
}
