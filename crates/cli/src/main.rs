mod client_commands;
mod config_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "zahra", about = "Zahra: WhatsApp gateway with an HTTP control surface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Only look for zahra.{toml,yaml,yml,json} in this directory.
    #[arg(long, global = true, env = "ZAHRA_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server and the WhatsApp session.
    Gateway {
        /// Overrides `gateway.bind`.
        #[arg(long)]
        bind: Option<String>,
        /// Overrides `gateway.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show the session status of a running gateway.
    Status {
        #[arg(long)]
        url: Option<String>,
    },
    /// Send a text message through a running gateway.
    Send {
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long, env = "ZAHRA_API_TOKEN")]
        token: Option<String>,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = &cli.config_dir {
        zahra_config::set_config_dir(dir.clone());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "zahra starting");

    match cli.command {
        Commands::Gateway { bind, port } => {
            let mut config = zahra_config::discover_and_load();
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            zahra_gateway::start_gateway(config).await
        },
        Commands::Status { url } => client_commands::status(url).await,
        Commands::Send {
            to,
            message,
            url,
            token,
        } => client_commands::send(url, token, &to, &message).await,
        Commands::Config { action } => config_commands::handle_config(action),
    }
}
