//! Configuration loading, validation, and env substitution.
//!
//! Config files: `zahra.toml`, `zahra.yaml`, or `zahra.json`
//! Searched in `./` then `~/.config/zahra/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_or_default_config_path,
        load_config, set_config_dir,
    },
    schema::{
        GatewayConfig, QrRenderer, ReconnectConfig, ReplyConfig, ReplyRule, WhatsAppBackend,
        WhatsAppConfig, ZahraConfig,
    },
};
