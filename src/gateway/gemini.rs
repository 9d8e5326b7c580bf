//! Google Generative Language API gateway
//!
//! Prompt synthesis goes through `generateContent` on the text model, image
//! synthesis through `predict` on the Imagen model.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GatewayError, ImageArtifact, ModelGateway, PromptArtifact, ART_DIRECTOR_DIRECTIVE};
use crate::Config;

/// Portrait format reads best on phones
const ASPECT_RATIO: &str = "3:4";

/// Block only high-severity content
const SAFETY_SETTING: &str = "block_only_high";

/// One image per request
const SAMPLE_COUNT: u32 = 1;

/// generateContent request
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// generateContent response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Imagen predict request
#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: &'static str,
    safety_setting: &'static str,
}

/// Imagen predict response
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    rai_filtered_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Gateway backed by Gemini (text) and Imagen (image) models
#[derive(Debug)]
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
}

impl GeminiGateway {
    /// Create a gateway from process configuration
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.model_timeout_secs))
            .build()
            .map_err(|e| GatewayError::upstream(None, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.model_api_key.clone(),
            api_base: config.model_api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model_name.clone(),
            image_model: config.image_model_name.clone(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let model = model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model API error: {} - {}", status, body);
            return Err(GatewayError::upstream(
                Some(status.as_u16()),
                api_error_message(&body, status.canonical_reason()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(None, format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn synthesize_prompt(&self, raw_text: &str) -> Result<String, GatewayError> {
        let url = self.endpoint(&self.text_model, "generateContent");
        debug!("Requesting image prompt from {}", self.text_model);

        let response: GenerateContentResponse =
            self.post_json(&url, &prompt_request(raw_text)).await?;
        prompt_text(response)
    }

    async fn synthesize_image(&self, prompt: &PromptArtifact) -> Result<ImageArtifact, GatewayError> {
        let url = self.endpoint(&self.image_model, "predict");
        debug!("Requesting image from {}", self.image_model);

        let response: PredictResponse = self.post_json(&url, &image_request(prompt)).await?;
        image_artifact(response)
    }
}

fn prompt_request(raw_text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(format!("{}\n\nNews: {}", ART_DIRECTOR_DIRECTIVE, raw_text)),
            }],
        }],
    }
}

fn prompt_text(response: GenerateContentResponse) -> Result<String, GatewayError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        warn!("Prompt model blocked the request: {}", reason);
    }

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn image_request(prompt: &PromptArtifact) -> PredictRequest {
    PredictRequest {
        instances: vec![PredictInstance {
            prompt: prompt.text().to_string(),
        }],
        parameters: PredictParameters {
            sample_count: SAMPLE_COUNT,
            aspect_ratio: ASPECT_RATIO,
            safety_setting: SAFETY_SETTING,
        },
    }
}

fn image_artifact(response: PredictResponse) -> Result<ImageArtifact, GatewayError> {
    let mut filtered_reason = None;

    for prediction in response.predictions {
        if let Some(encoded) = prediction.bytes_base64_encoded.filter(|data| !data.is_empty()) {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| GatewayError::upstream(None, format!("invalid image payload: {}", e)))?;
            return Ok(ImageArtifact::new(bytes));
        }
        if filtered_reason.is_none() {
            filtered_reason = prediction.rai_filtered_reason;
        }
    }

    // Imagen drops filtered samples, so an empty prediction list is a refusal too
    Err(GatewayError::ContentPolicy(
        filtered_reason.unwrap_or_else(|| "no image returned".to_string()),
    ))
}

/// Pull `error.message` out of an API error body, falling back to the raw body
fn api_error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.error.message;
    }
    let body = body.trim();
    if body.is_empty() {
        reason.unwrap_or("no response body").to_string()
    } else {
        body.to_string()
    }
}
