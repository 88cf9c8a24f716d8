//! Chat relay - CLI server
//!
//! ```sh
//! # Run with default config (~/.config/chat-relay/config.toml)
//! chat-relay
//!
//! # Custom config path and upstream
//! chat-relay --config /etc/chat-relay/config.toml --upstream-url ws://peer:5000/
//!
//! # Keep reconnecting after the upstream drops
//! chat-relay --reconnect
//!
//! # Validate config without starting
//! chat-relay --check
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};

use chat_relay::config::AppConfig;
use chat_relay::server::{init_tracing, ServerHandle, ServerOptions};
use chat_relay::{ConfigError, RelayError};

/// Relay chats between an upstream WebSocket peer and local clients.
#[derive(Parser, Debug)]
#[command(
    name = "chat-relay",
    version,
    about = "Bidirectional chat relay",
    long_about = "Connects to an upstream WebSocket chat peer, streams its chats to local \
                  subscribers and forwards locally submitted chats upstream.\n\n\
                  Default config: ~/.config/chat-relay/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "CHAT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the upstream WebSocket URL.
    #[arg(long)]
    upstream_url: Option<String>,

    /// Reconnect to the upstream with backoff after it drops.
    #[arg(long)]
    reconnect: bool,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the relay.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(chat_relay::default_config_path);

    let (mut config, load_error) = match load_config(&config_path, cli.check) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ Configuration is invalid");
            eprintln!("   Config file : {}", config_path.display());
            eprintln!("   Error       : {}", e);
            return Err(e.into());
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        config.server.api_port = port;
    }
    if let Some(url) = cli.upstream_url {
        config.upstream.url = url;
    }
    if cli.reconnect {
        config.upstream.reconnect = true;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Tracing goes up once the log level is final
    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}", config.server.address());
        println!("   Upstream    : {}", config.upstream.url);
        println!("   Reconnect   : {}", config.upstream.reconnect);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start relay ────────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions { config }).await?;

    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

/// Load the config file.
///
/// In `--check` mode the file must exist and parse. Otherwise a missing file
/// is created with defaults, and a broken one falls back to defaults with the
/// error handed back for logging.
fn load_config(
    path: &Path,
    check: bool,
) -> Result<(AppConfig, Option<ConfigError>), RelayError> {
    if check {
        return Ok((AppConfig::load(path)?, None));
    }

    match AppConfig::load_or_create(path) {
        Ok(config) => Ok((config, None)),
        Err(e) => Ok((AppConfig::default(), Some(e))),
    }
}
