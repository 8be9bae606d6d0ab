//! Gateway: HTTP control surface in front of the WhatsApp session.
//!
//! Lifecycle:
//! 1. Load config, resolve the API token
//! 2. Wire the bridge client, lifecycle manager and message relay
//! 3. Bind and serve `/`, `/qr`, `/status`, `/health`, `/send`, `/session/start`
//! 4. Start the session; shut down on Ctrl-C
//!
//! Session semantics live in `zahra-whatsapp`; handlers here only translate
//! between HTTP and the relay/session handle.

pub mod auth;
pub mod error;
pub mod qr;
pub mod server;
pub mod state;

pub use {
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
