//! Common test utilities - in-process gateway and transport doubles

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use infobot::dispatch::Dispatcher;
use infobot::gateway::{GatewayError, ImageArtifact, ModelGateway, PromptArtifact};
use infobot::pipeline::Pipeline;
use infobot::session::DeliverySession;
use infobot::transport::{ChatTransport, MessageRef, TransportError};

/// Bytes returned by the fake image model
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

/// The message the user sent
pub const SOURCE: MessageRef = MessageRef {
    chat_id: 1001,
    message_id: 1,
};

/// Scripted model gateway that counts calls
pub struct FakeGateway {
    prompt: Result<String, GatewayError>,
    image: Result<ImageArtifact, GatewayError>,
    delay: Duration,
    pub prompt_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn new(
        prompt: Result<String, GatewayError>,
        image: Result<ImageArtifact, GatewayError>,
    ) -> Self {
        Self {
            prompt,
            image,
            delay: Duration::ZERO,
            prompt_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Gateway where both stages succeed
    pub fn succeeding(prompt: &str) -> Self {
        Self::new(
            Ok(prompt.to_string()),
            Ok(ImageArtifact::new(PNG_BYTES.to_vec())),
        )
    }

    /// Sleep inside every call so concurrent requests overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompt_calls(&self) -> usize {
        self.prompt_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for FakeGateway {
    async fn synthesize_prompt(&self, _raw_text: &str) -> Result<String, GatewayError> {
        self.prompt_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.prompt.clone()
    }

    async fn synthesize_image(&self, prompt: &PromptArtifact) -> Result<ImageArtifact, GatewayError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.text().to_string());
        tokio::time::sleep(self.delay).await;
        self.image.clone()
    }
}

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReplyText {
        to: MessageRef,
        text: String,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Delete(MessageRef),
    Photo {
        to: MessageRef,
        path: PathBuf,
        caption: String,
        bytes: Vec<u8>,
    },
}

/// Transport double that records every call
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    fail_reply: bool,
    fail_edit: bool,
    fail_delete: bool,
    fail_photo: bool,
}

/// Transport operation to make fail
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Reply,
    Edit,
    Delete,
    Photo,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            ..Default::default()
        }
    }

    /// Transport where one kind of call always fails
    pub fn failing(op: Fail) -> Self {
        let mut transport = Self::new();
        match op {
            Fail::Reply => transport.fail_reply = true,
            Fail::Edit => transport.fail_edit = true,
            Fail::Delete => transport.fail_delete = true,
            Fail::Photo => transport.fail_photo = true,
        }
        transport
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn photos(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Photo { .. }))
            .collect()
    }

    pub fn photo_paths(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Photo { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

fn refused(what: &str) -> TransportError {
    TransportError::Api {
        code: Some(400),
        description: format!("Bad Request: {} refused", what),
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn reply_text(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError> {
        if self.fail_reply {
            return Err(refused("sendMessage"));
        }
        self.record(Call::ReplyText {
            to,
            text: text.to_string(),
        });
        Ok(self.next_ref(to.chat_id))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        if self.fail_edit {
            return Err(refused("editMessageText"));
        }
        self.record(Call::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError> {
        if self.fail_delete {
            return Err(refused("deleteMessage"));
        }
        self.record(Call::Delete(message));
        Ok(())
    }

    async fn reply_photo(
        &self,
        to: MessageRef,
        photo: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError> {
        // Read like the real client does, so a missing slot surfaces here
        let bytes = tokio::fs::read(photo).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.record(Call::Photo {
            to,
            path: photo.to_path_buf(),
            caption: caption.to_string(),
            bytes,
        });
        if self.fail_photo {
            return Err(refused("sendPhoto"));
        }
        Ok(self.next_ref(to.chat_id))
    }
}

/// Build a session over the doubles
pub fn session(
    transport: &Arc<RecordingTransport>,
    gateway: &Arc<FakeGateway>,
    slot_dir: &Path,
) -> DeliverySession {
    let pipeline = Arc::new(Pipeline::new(gateway.clone()));
    DeliverySession::new(transport.clone(), pipeline, slot_dir.to_path_buf(), SOURCE)
}

/// Build a dispatcher over the doubles
pub fn dispatcher(
    transport: &Arc<RecordingTransport>,
    gateway: &Arc<FakeGateway>,
    slot_dir: &Path,
) -> Dispatcher {
    let pipeline = Arc::new(Pipeline::new(gateway.clone()));
    Dispatcher::new(transport.clone(), pipeline, slot_dir.to_path_buf())
}

/// Number of entries left in a directory
pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
