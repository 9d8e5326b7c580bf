//! Generation pipeline
//!
//! Two sequential stages, no retries:
//! 1. The text model turns the news item into an image prompt
//! 2. The image model renders that prompt
//!
//! Every gateway error is converted into a [`Failure`] here; nothing raw
//! escapes to the delivery layer.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayError, ImageArtifact, ModelGateway, PromptArtifact};

/// One user-submitted news item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    raw_text: String,
}

impl Request {
    /// Wrap incoming text, rejecting blank messages
    pub fn new(raw_text: impl Into<String>) -> Option<Self> {
        let raw_text = raw_text.into();
        if raw_text.trim().is_empty() {
            None
        } else {
            Some(Self { raw_text })
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The prompt model call failed
    PromptStageFailed,
    /// The prompt model answered with blank text
    EmptyPrompt,
    /// The image model call failed
    ImageStageFailed {
        /// The failure looks like missing image-generation entitlement
        access_denied: bool,
    },
    /// Handing the image to the chat transport failed
    DeliveryFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::PromptStageFailed => write!(f, "prompt stage failed"),
            ErrorKind::EmptyPrompt => write!(f, "empty prompt"),
            ErrorKind::ImageStageFailed {
                access_denied: true,
            } => write!(f, "image stage failed (access denied)"),
            ErrorKind::ImageStageFailed {
                access_denied: false,
            } => write!(f, "image stage failed"),
            ErrorKind::DeliveryFailed => write!(f, "delivery failed"),
        }
    }
}

/// Terminal failure of one request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    fn prompt_stage(err: GatewayError) -> Self {
        let kind = match err {
            GatewayError::EmptyResponse => ErrorKind::EmptyPrompt,
            _ => ErrorKind::PromptStageFailed,
        };
        Self::new(kind, err.to_string())
    }

    fn image_stage(err: GatewayError) -> Self {
        Self::new(
            ErrorKind::ImageStageFailed {
                access_denied: err.is_access_denied(),
            },
            err.to_string(),
        )
    }
}

/// Output of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub image: ImageArtifact,
    pub prompt: PromptArtifact,
}

/// Terminal value of the pipeline for one request
pub type GenerationResult = Result<Generated, Failure>;

/// Prompt-then-image pipeline over a model gateway
pub struct Pipeline {
    gateway: Arc<dyn ModelGateway>,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Run both stages for one request
    pub async fn generate(&self, request: Request) -> GenerationResult {
        // Stage 1: prompt
        debug!("Requesting image prompt");
        let raw_prompt = self
            .gateway
            .synthesize_prompt(request.raw_text())
            .await
            .map_err(|e| {
                warn!("Prompt stage failed: {}", e);
                Failure::prompt_stage(e)
            })?;

        let prompt = PromptArtifact::parse(&raw_prompt).ok_or_else(|| {
            warn!("Prompt model returned blank text");
            Failure::new(ErrorKind::EmptyPrompt, "the model returned a blank prompt")
        })?;

        info!("Image prompt: {}", prompt.text());

        // Stage 2: image
        debug!("Requesting image");
        let image = self
            .gateway
            .synthesize_image(&prompt)
            .await
            .map_err(|e| {
                warn!("Image stage failed: {}", e);
                Failure::image_stage(e)
            })?;

        if image.bytes().is_empty() {
            warn!("Image model returned no bytes");
            return Err(Failure::new(
                ErrorKind::ImageStageFailed {
                    access_denied: false,
                },
                "the model returned an empty image",
            ));
        }

        info!("Image generated ({} bytes)", image.bytes().len());
        Ok(Generated { image, prompt })
    }
}
