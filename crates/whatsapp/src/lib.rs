//! WhatsApp session core: connection lifecycle, message relay, auto-reply,
//! and the protocol clients (WebSocket bridge, in-process `native`).
//!
//! Wiring:
//! 1. [`LifecycleManager::new`] returns the manager and a [`SessionHandle`]
//! 2. [`MessageRelay`] reads the handle to gate sends
//! 3. The manager forwards inbound text messages to the relay's queue
//! 4. [`SessionHandle::start`] kicks off the first establishment

pub mod backoff;
pub mod bridge;
pub mod error;
pub mod lifecycle;
pub mod message;
#[cfg(feature = "native")]
pub mod native;
pub mod relay;
pub mod reply;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    backoff::Backoff,
    bridge::BridgeClient,
    error::{DeliveryFailure, SendError, SessionError},
    lifecycle::{LifecycleManager, SessionHandle},
    message::{InboundEvent, OutboundRequest, normalize_recipient},
    relay::MessageRelay,
    reply::{ExactMatchPolicy, NoReply, ReplyPolicy},
    session::{Session, SessionState},
};

#[cfg(feature = "native")]
pub use native::NativeClient;
