//! fail2rest - Entry Point

use fail2rest::{Config, Server};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_help() {
    println!("fail2rest v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: fail2rest [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config, -c <PATH>  Config file (TOML)");
    println!("  --help, -h           Show this help");
    println!();
    println!("Config lookup without --config: $FAIL2REST_CONFIG, ./fail2rest.toml,");
    println!("/etc/fail2rest/config.toml");
    println!();
    println!("Environment variables:");
    println!("  FAIL2REST_HOST         Bind address");
    println!("  FAIL2REST_PORT         Port (default: 8080)");
    println!("  FAIL2REST_JWT_SECRET   Token signing secret (at least 32 bytes)");
    println!("  FAIL2REST_API_KEYS     Comma-separated API keys");
    println!("  FAIL2REST_CLIENT_PATH  Path to fail2ban-client");
    println!("  FAIL2REST_USE_SUDO     Run fail2ban-client through sudo (true/1)");
    println!("  FAIL2REST_LOG_LEVEL    Default log filter (RUST_LOG wins)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|a| a == "--config" || a == "-c")
        .map(|i| {
            args.get(i + 1)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("--config needs a path"))
        })
        .transpose()?;

    let config = Config::load(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("fail2rest v{}", env!("CARGO_PKG_VERSION"));

    Server::new(config)?.run().await
}
