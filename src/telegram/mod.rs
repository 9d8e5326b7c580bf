//! Telegram transport
//!
//! Provides:
//! - A Bot API client implementing [`ChatTransport`](crate::transport::ChatTransport)
//! - Long polling for updates
//! - Command parsing

mod client;
mod types;

pub use client::BotClient;
pub use types::{ApiResponse, Chat, Command, Message, ReplyParameters, Update, User};
