//! infobot - news-to-infographic Telegram bot

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use infobot::{Bot, Config};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// News-to-infographic Telegram bot
#[derive(Parser, Debug)]
#[command(name = "infobot", version, about = "Turn news text into infographic images")]
struct Args {
    /// Optional TOML config file (environment variables take precedence)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// .env file to load (default: ./.env if present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env before reading RUST_LOG or config
    let env_loaded = match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            true
        }
        None => dotenvy::dotenv().is_ok(),
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "infobot=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    if env_loaded {
        info!("Loaded environment file");
    }

    let config = Config::load(args.config.as_deref())
        .context("TRANSPORT_TOKEN and MODEL_API_KEY must be set")?;

    let bot = Arc::new(Bot::new(config)?);

    let signal_bot = bot.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_bot.shutdown();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    bot.run().await?;

    Ok(())
}
