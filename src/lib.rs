//! infobot - news-to-infographic chat bot
//!
//! Reads news text from Telegram, asks a language model for a visual concept,
//! renders it with an image model and replies with the picture.

pub mod dispatch;
pub mod gateway;
pub mod pipeline;
pub mod session;
pub mod telegram;
pub mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use dispatch::Dispatcher;
use gateway::{GatewayError, GeminiGateway};
use pipeline::Pipeline;
use telegram::BotClient;
use transport::TransportError;

pub use dispatch::GREETING;

/// Environment keys recognized by [`Config::figment`]
const ENV_KEYS: [&str; 9] = [
    "transport_token",
    "model_api_key",
    "text_model_name",
    "image_model_name",
    "model_api_base",
    "model_timeout_secs",
    "transport_api_base",
    "poll_timeout_secs",
    "slot_dir",
];

/// Delay before polling again after a failed getUpdates call
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid configuration: {0}")]
    Figment(#[from] figment::Error),
}

/// Bot configuration
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Telegram bot token
    pub transport_token: String,
    /// Generative Language API key
    pub model_api_key: String,
    #[serde(default = "default_text_model")]
    pub text_model_name: String,
    #[serde(default = "default_image_model")]
    pub image_model_name: String,
    #[serde(default = "default_model_api_base")]
    pub model_api_base: String,
    /// Upper bound for a single model call
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,
    #[serde(default = "default_transport_api_base")]
    pub transport_api_base: String,
    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Directory for ephemeral image files (None = system temp dir)
    #[serde(default)]
    pub slot_dir: Option<PathBuf>,
}

fn default_text_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

fn default_model_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

fn default_transport_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Config {
    /// Config with the two required credentials and every default
    pub fn new(transport_token: impl Into<String>, model_api_key: impl Into<String>) -> Self {
        Self {
            transport_token: transport_token.into(),
            model_api_key: model_api_key.into(),
            text_model_name: default_text_model(),
            image_model_name: default_image_model(),
            model_api_base: default_model_api_base(),
            model_timeout_secs: default_model_timeout(),
            transport_api_base: default_transport_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            slot_dir: None,
        }
    }

    /// Configuration sources: optional TOML file, then environment
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::raw().only(&ENV_KEYS))
    }

    /// Extract and validate configuration
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        if config.transport_token.trim().is_empty() {
            return Err(ConfigError::Empty("TRANSPORT_TOKEN"));
        }
        if config.model_api_key.trim().is_empty() {
            return Err(ConfigError::Empty("MODEL_API_KEY"));
        }
        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_file))
    }

    /// Directory used for ephemeral image files
    pub fn slot_dir(&self) -> PathBuf {
        self.slot_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Errors that stop the bot
#[derive(Debug, Error)]
pub enum BotError {
    #[error("model gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("chat transport: {0}")]
    Transport(#[from] TransportError),
}

/// The bot instance: polls Telegram and dispatches updates
pub struct Bot {
    config: Config,
    client: Arc<BotClient>,
    dispatcher: Dispatcher,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Bot {
    /// Create a new bot instance
    pub fn new(config: Config) -> Result<Self, BotError> {
        let gateway = GeminiGateway::new(&config)?;
        let client = Arc::new(BotClient::new(
            &config.transport_api_base,
            &config.transport_token,
        )?);
        let pipeline = Arc::new(Pipeline::new(Arc::new(gateway)));
        let dispatcher = Dispatcher::new(client.clone(), pipeline, config.slot_dir());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            client,
            dispatcher,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Check the token, then poll for updates until shutdown
    pub async fn run(&self) -> Result<(), BotError> {
        let me = self.client.get_me().await?;
        info!(
            "infobot running as @{} (text model {}, image model {})",
            me.username.as_deref().unwrap_or("unknown"),
            self.config.text_model_name,
            self.config.image_model_name
        );

        self.poll_updates().await;
        info!("infobot shutdown complete");
        Ok(())
    }

    /// Long-poll loop; polling errors are retried after a short delay
    pub async fn poll_updates(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut offset: i64 = 0;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = self.client.get_updates(offset, self.config.poll_timeout_secs) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            self.dispatcher.dispatch(update);
                        }
                    }
                    Err(e) => {
                        warn!("Polling failed: {}", e);
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                        }
                    }
                },
            }
        }
    }

    /// Signal the bot to stop polling
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
