use eyre::{Result, WrapErr};
use reserve_watch::execution::{DiscordNotifier, Notifier};
use reserve_watch::utils::config_loader::WatchConfigLoader;
use reserve_watch::{ReserveWatchServiceBuilder, RpcChainClient, WatchConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

fn load_config() -> Result<WatchConfig> {
    let file_name = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RESERVE_WATCH_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    if Path::new(&file_name).exists() {
        info!("Loading config from {}", file_name);
        return WatchConfig::load_section_from_file(&file_name).wrap_err_with(|| format!("failed to load {file_name}"));
    }

    info!("No config file at {}, reading environment", file_name);
    Ok(WatchConfig::from_env()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_line_number(true)
        .init();

    let config = load_config()?;
    config.validate().wrap_err("invalid configuration")?;

    info!("RPC: {}", config.rpc_url);
    info!("Configurators: {:?}", config.configurators);
    info!("Risk config: {:?}", config.risk);

    let client = Arc::new(RpcChainClient::new(config.rpc_url()?));
    let mut builder = ReserveWatchServiceBuilder::new().with_client(client);

    match &config.discord {
        Some(discord) => {
            let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(discord, Duration::from_secs(10))?);
            builder = builder.with_notifier(notifier);
            info!("Discord notifications enabled");
        }
        None => warn!("Discord notifications disabled (DISCORD_BOT_TOKEN / DISCORD_ALERT_USER_ID not set)"),
    }

    let mut service = builder.with_config(config).build()?;
    service.run().await;

    Ok(())
}
