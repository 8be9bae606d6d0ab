/// Config schema types (gateway, whatsapp session, auto-reply).
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZahraConfig {
    pub gateway: GatewayConfig,
    pub whatsapp: WhatsAppConfig,
    pub reply: ReplyConfig,
}

/// How `/qr` renders the pairing token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrRenderer {
    /// Inline SVG generated in-process.
    #[default]
    Svg,
    /// `<img>` pointing at a public QR image service.
    Remote,
}

/// Which protocol client drives the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhatsAppBackend {
    /// JSON-over-WebSocket bridge to an external sidecar (`bridge_url`).
    #[default]
    Bridge,
    /// In-process multi-device client; needs the `native` build feature.
    Native,
}

/// HTTP control surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    /// Display name used on the landing page and in logs.
    pub bot_name: String,
    pub qr_renderer: QrRenderer,
    /// Bearer token required on POST endpoints. Unset means no auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            bot_name: "ZahraBot".into(),
            qr_renderer: QrRenderer::default(),
            api_token: None,
        }
    }
}

/// WhatsApp session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub backend: WhatsAppBackend,
    /// WebSocket URL of the protocol bridge sidecar.
    pub bridge_url: String,
    /// Directory where session credentials are persisted.
    pub auth_dir: String,
    /// Upper bound on a single outbound send.
    pub send_timeout_secs: u64,
    /// Upper bound on a single session establishment attempt.
    pub connect_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            backend: WhatsAppBackend::default(),
            bridge_url: "ws://127.0.0.1:3001".into(),
            auth_dir: "./auth".into(),
            send_timeout_secs: 10,
            connect_timeout_secs: 15,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl WhatsAppConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Automatic reconnection after a recoverable disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Consecutive failed attempts before giving up. Unset retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_attempts: None,
        }
    }
}

/// Auto-reply rules applied to inbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    pub case_sensitive: bool,
    pub rules: Vec<ReplyRule>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            rules: vec![ReplyRule {
                trigger: "halo".into(),
                response: "Halo juga dari ZahraBot! 👋".into(),
            }],
        }
    }
}

/// A single exact-match trigger and its canned response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRule {
    pub trigger: String,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ZahraConfig = toml::from_str(
            r#"
            [gateway]
            port = 8080

            [whatsapp.reconnect]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.gateway.port, 8080);
        assert_eq!(cfg.gateway.bind, "127.0.0.1");
        assert_eq!(cfg.whatsapp.reconnect.max_attempts, Some(5));
        assert_eq!(cfg.whatsapp.reconnect.initial_backoff_ms, 1_000);
        assert_eq!(cfg.reply.rules.len(), 1);
    }

    #[test]
    fn qr_renderer_is_lowercase() {
        let cfg: GatewayConfig = serde_json::from_str(r#"{"qr_renderer":"remote"}"#).unwrap();
        assert_eq!(cfg.qr_renderer, QrRenderer::Remote);
    }

    #[test]
    fn backend_defaults_to_bridge() {
        let cfg: WhatsAppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.backend, WhatsAppBackend::Bridge);
        let cfg: WhatsAppConfig = toml::from_str(r#"backend = "native""#).unwrap();
        assert_eq!(cfg.backend, WhatsAppBackend::Native);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = ZahraConfig::default();
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let back: ZahraConfig = toml::from_str(&raw).unwrap();
        assert_eq!(cfg, back);
    }
}
