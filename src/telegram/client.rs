//! Telegram Bot API client

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::types::{ApiResponse, Message, ReplyParameters, Update, User};
use crate::gateway::ImageArtifact;
use crate::transport::{ChatTransport, MessageRef, TransportError};

/// Timeout for ordinary API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for photo uploads
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Slack added on top of the long-poll timeout
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Bot API client bound to one bot token
#[derive(Debug)]
pub struct BotClient {
    client: Client,
    base_url: String,
}

impl BotClient {
    /// Create a client for `api_base` (e.g. https://api.telegram.org)
    pub fn new(api_base: &str, token: &str) -> Result<Self, TransportError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Identify the bot (used as a startup credential check)
    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &json!({}), REQUEST_TIMEOUT).await
    }

    /// Long-poll for new message updates
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(timeout_secs) + POLL_SLACK,
            )
            .await?;
        if !updates.is_empty() {
            debug!("Received {} updates", updates.len());
        }
        Ok(updates)
    }
}

#[async_trait]
impl ChatTransport for BotClient {
    async fn reply_text(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError> {
        let params = json!({
            "chat_id": to.chat_id,
            "text": text,
            "reply_parameters": ReplyParameters::to(to.message_id),
        });
        let message: Message = self.call("sendMessage", &params, REQUEST_TIMEOUT).await?;
        Ok(MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        let params = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
        });
        let _: serde_json::Value = self
            .call("editMessageText", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError> {
        let params = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
        });
        let _: bool = self.call("deleteMessage", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn reply_photo(
        &self,
        to: MessageRef,
        photo: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError> {
        let bytes = tokio::fs::read(photo).await?;
        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("infographic.{}", ImageArtifact::EXTENSION));

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(ImageArtifact::MIME_TYPE)?;
        let reply = serde_json::to_string(&ReplyParameters::to(to.message_id))
            .map_err(|e| TransportError::Io(e.into()))?;
        let form = Form::new()
            .text("chat_id", to.chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .text("reply_parameters", reply)
            .part("photo", part);

        let response: ApiResponse<Message> = self
            .client
            .post(self.method_url("sendPhoto"))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        let message = response.into_result()?;

        Ok(MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }
}
