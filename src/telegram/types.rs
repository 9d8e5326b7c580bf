//! Telegram Bot API wire types (only the fields the bot reads)

use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// Envelope around every Bot API result
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(TransportError::Api {
                code: self.error_code,
                description: self
                    .description
                    .unwrap_or_else(|| "request was not successful".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

/// Reply target for outgoing messages
#[derive(Debug, Clone, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

impl ReplyParameters {
    pub fn to(message_id: i64) -> Self {
        Self {
            message_id,
            allow_sending_without_reply: true,
        }
    }
}

/// Bot command found at the start of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Other(String),
}

impl Command {
    /// Parse `/name`, `/name@bot` or `/name args`; None for plain text
    pub fn parse(text: &str) -> Option<Command> {
        let rest = text.trim_start().strip_prefix('/')?;
        let word = rest.split(char::is_whitespace).next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        match name {
            "start" => Some(Command::Start),
            other => Some(Command::Other(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start@infobot"), Some(Command::Start));
        assert_eq!(
            Command::parse("/help me"),
            Some(Command::Other("help".to_string()))
        );
        assert_eq!(Command::parse("Stocks rally after rate cut"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse("/ start"), None);
    }

    #[test]
    fn test_update_parsing() {
        let response: ApiResponse<Vec<Update>> = serde_json::from_value(serde_json::json!({
            "ok": true,
            "result": [{
                "update_id": 42,
                "message": {
                    "message_id": 7,
                    "date": 1700000000,
                    "chat": {"id": -100123, "type": "private"},
                    "from": {"id": 1, "is_bot": false, "first_name": "A"},
                    "text": "Stocks rally after rate cut"
                }
            }, {
                "update_id": 43,
                "edited_message": {"message_id": 7, "chat": {"id": 1}}
            }]
        }))
        .unwrap();

        let updates = response.into_result().unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100123);
        assert_eq!(message.text.as_deref(), Some("Stocks rally after rate cut"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_error_envelope() {
        let response: ApiResponse<bool> = serde_json::from_value(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: message to delete not found"
        }))
        .unwrap();

        match response.into_result() {
            Err(TransportError::Api { code, description }) => {
                assert_eq!(code, Some(400));
                assert!(description.contains("not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
