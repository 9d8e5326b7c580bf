//! Delivery session
//!
//! Drives one status message through its lifecycle for a single request:
//! created ("analyzing"), updated ("rendering"), then either deleted after
//! the photo is sent or replaced with an error message.

mod slot;

pub use slot::StorageSlot;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::gateway::PromptArtifact;
use crate::pipeline::{ErrorKind, Failure, Generated, Pipeline, Request};
use crate::transport::{ChatTransport, MessageRef};

/// Initial status text
pub const ANALYZING_STATUS: &str = "🧠 Analyzing the news and sketching an infographic concept...";

/// Status text while the image is handed over
pub const RENDERING_STATUS: &str = "🎨 Rendering the image...";

/// Appended when the failure looks like missing entitlement
pub const ACCESS_HINT: &str = "Your API key may not have access to image generation. \
Check that the key is entitled to use the image model, or set IMAGE_MODEL_NAME to a model it can use.";

const CAPTION_TITLE: &str = "📊 Infographic ready!";
const CAPTION_LEAD: &str = "Here is how the AI chose to visualize it:";

/// Telegram caption limit, in UTF-16 code units of visible text
const CAPTION_LIMIT: usize = 1024;

/// Telegram text message limit, in UTF-16 code units
const MESSAGE_LIMIT: usize = 4096;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Photo sent and status message removed
    Delivered,
    /// Status message replaced with an error
    Failed(ErrorKind),
    /// The initial status message could not be sent
    Abandoned,
}

/// One request's delivery lifecycle
pub struct DeliverySession {
    transport: Arc<dyn ChatTransport>,
    pipeline: Arc<Pipeline>,
    slot_dir: PathBuf,
    source: MessageRef,
    request_id: Uuid,
}

impl DeliverySession {
    /// Create a session answering the message `source`
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        pipeline: Arc<Pipeline>,
        slot_dir: PathBuf,
        source: MessageRef,
    ) -> Self {
        Self {
            transport,
            pipeline,
            slot_dir,
            source,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Run the pipeline and resolve the status message
    ///
    /// Never fails: every error ends in a user-visible terminal state or a log line.
    pub async fn run(self, request: Request) -> Outcome {
        let span = info_span!("request", id = %self.request_id, chat = self.source.chat_id);
        self.resolve(request).instrument(span).await
    }

    async fn resolve(self, request: Request) -> Outcome {
        info!("New request ({} chars)", request.raw_text().chars().count());

        let status = match self.transport.reply_text(self.source, ANALYZING_STATUS).await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to send status message: {}", e);
                return Outcome::Abandoned;
            }
        };

        let result = match self.pipeline.generate(request).await {
            Ok(generated) => self.deliver(status, generated).await,
            Err(failure) => Err(failure),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.transport.delete_message(status).await {
                    warn!("Failed to delete status message: {}", e);
                }
                info!("Delivered");
                Outcome::Delivered
            }
            Err(failure) => {
                warn!("Request failed: {}", failure);
                if let Err(e) = self
                    .transport
                    .edit_text(status, &failure_message(&failure))
                    .await
                {
                    error!("Failed to report failure to user: {}", e);
                }
                Outcome::Failed(failure.kind)
            }
        }
    }

    /// Store the image, update the status and hand the photo to the transport
    async fn deliver(&self, status: MessageRef, generated: Generated) -> Result<(), Failure> {
        let slot = StorageSlot::create(&self.slot_dir, self.request_id, &generated.image)
            .await
            .map_err(|e| {
                Failure::new(
                    ErrorKind::DeliveryFailed,
                    format!("failed to store image: {}", e),
                )
            })?;

        if let Err(e) = self.transport.edit_text(status, RENDERING_STATUS).await {
            warn!("Failed to update status message: {}", e);
        }

        let sent = self
            .transport
            .reply_photo(self.source, slot.path(), &caption(&generated.prompt))
            .await;
        slot.close();

        sent.map(|_| ())
            .map_err(|e| Failure::new(ErrorKind::DeliveryFailed, e.to_string()))
    }
}

/// User-facing text for a failed request
///
/// The upstream detail is shortened so the whole text fits one message.
pub fn failure_message(failure: &Failure) -> String {
    let (lead, hint) = match failure.kind {
        ErrorKind::PromptStageFailed => ("Generation failed while analyzing the news: ", None),
        ErrorKind::EmptyPrompt => {
            return "Generation failed: the model could not come up with a concept for this text. \
Try rephrasing the news item."
                .to_string();
        }
        ErrorKind::ImageStageFailed { access_denied } => (
            "Generation failed while rendering the image: ",
            access_denied.then_some(ACCESS_HINT),
        ),
        ErrorKind::DeliveryFailed => ("Could not send the image: ", None),
    };

    let hint_units = hint.map_or(0, |hint| hint.encode_utf16().count() + 2);
    let budget = MESSAGE_LIMIT.saturating_sub(lead.encode_utf16().count() + hint_units);

    let mut message = format!("{}{}", lead, truncate_utf16(&failure.detail, budget));
    if let Some(hint) = hint {
        message.push_str("\n\n");
        message.push_str(hint);
    }
    message
}

/// Photo caption (HTML) embedding the prompt the model chose
pub fn caption(prompt: &PromptArtifact) -> String {
    let header_units = CAPTION_TITLE.encode_utf16().count() + CAPTION_LEAD.encode_utf16().count() + 3;
    let budget = CAPTION_LIMIT.saturating_sub(header_units);

    format!(
        "<b>{}</b>\n\n<i>{}</i>\n{}",
        CAPTION_TITLE,
        CAPTION_LEAD,
        escape_html(&truncate_utf16(prompt.text(), budget))
    )
}

/// Cut `text` to at most `limit` UTF-16 units, marking the cut with an ellipsis
fn truncate_utf16(text: &str, limit: usize) -> String {
    if text.encode_utf16().count() <= limit {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        // Reserve one unit for the ellipsis
        if used + ch.len_utf16() + 1 > limit {
            break;
        }
        used += ch.len_utf16();
        out.push(ch);
    }
    out.push('…');
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
