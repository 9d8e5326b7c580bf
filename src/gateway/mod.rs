//! Model gateway
//!
//! Provides:
//! - The two remote capabilities the pipeline needs (prompt and image synthesis)
//! - Prompt and image artifacts
//! - Structured gateway errors

mod gemini;

pub use gemini::GeminiGateway;

use async_trait::async_trait;
use thiserror::Error;

/// Directive prepended to every news item sent to the prompt model
pub const ART_DIRECTOR_DIRECTIVE: &str = "You are a professional infographic designer and news analyst. \
Read the news item below and write a detailed prompt, in English only, for an image generation model. \
The image must be a stylish, minimalist infographic that captures the essence of the news. \
Use only visual metaphors, charts, icons and diagrams. Do not put any text, letters or numbers in the image. \
Reply with exactly one prompt and nothing else: no explanations, no preamble, no alternatives.";

/// Upstream status codes treated as an access/entitlement problem
///
/// The Generative Language API answers 400 (billing precondition) when a key
/// is not allowed to use Imagen; 401 and 403 cover plain auth failures.
const ACCESS_DENIED_STATUSES: [u16; 3] = [400, 401, 403];

/// Errors surfaced by a model gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport, auth or quota failure
    #[error("{}", upstream_message(.status, .message))]
    Upstream {
        /// HTTP status when the backend answered at all
        status: Option<u16>,
        message: String,
    },

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("blocked by content policy: {0}")]
    ContentPolicy(String),
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("upstream error {}: {}", code, message),
        None => format!("upstream request failed: {}", message),
    }
}

impl GatewayError {
    /// Build an upstream error from a failed HTTP exchange
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Whether this error looks like missing credentials or entitlement
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            GatewayError::Upstream { status: Some(code), .. } if ACCESS_DENIED_STATUSES.contains(code)
        )
    }
}

/// Image description produced by the prompt stage
///
/// Never empty: construction trims and rejects blank text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArtifact {
    text: String,
}

impl PromptArtifact {
    /// Validate raw model output, returning None for blank text
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            None
        } else {
            Some(Self {
                text: text.to_string(),
            })
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Rendered image bytes (always PNG)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    bytes: Vec<u8>,
}

impl ImageArtifact {
    pub const MIME_TYPE: &'static str = "image/png";
    pub const EXTENSION: &'static str = "png";

    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Remote generation capabilities used by the pipeline
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Turn a news item into a single image prompt
    ///
    /// Returns the model's raw text; callers validate it into a
    /// [`PromptArtifact`].
    async fn synthesize_prompt(&self, raw_text: &str) -> Result<String, GatewayError>;

    /// Render one image for the prompt
    async fn synthesize_image(&self, prompt: &PromptArtifact) -> Result<ImageArtifact, GatewayError>;
}
