//! Chat transport seam
//!
//! The four calls a delivery session makes toward the chat platform.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// A message in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request failed before an API response arrived (URL stripped)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Bot API URLs embed the bot token, so it must not reach a Display
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

/// Outbound chat operations
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text reply to a message
    async fn reply_text(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError>;

    /// Replace the text of a message sent earlier
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError>;

    /// Reply with the photo stored at `photo`
    ///
    /// The file is read once before this returns. `caption` is HTML.
    async fn reply_photo(
        &self,
        to: MessageRef,
        photo: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError>;
}
