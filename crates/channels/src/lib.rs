//! Protocol collaborator seam.
//!
//! The messaging-network client (pairing, encryption, socket framing) lives
//! outside this workspace. Everything that talks to it implements
//! [`ProtocolClient`] and reports back through an [`EventSink`] of
//! [`ChannelEvent`]s.

pub mod events;
pub mod plugin;

pub use {
    events::{ChannelEvent, DisconnectReason, EventSink, InboundMessage},
    plugin::{MessageAck, ProtocolClient},
};
