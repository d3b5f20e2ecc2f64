//! Gemini (Google) image editing capability.
//!
//! Edits a reference photo per a grounded instruction. A successful call with
//! zero image parts resolves to [`InvokeOutcome::Empty`], not an error.

use crate::error::{parse_retry_after, sanitize_error_message, Result, StageError};
use crate::model::client::{validate_request, StagingModel};
use crate::model::types::{
    ImageFormat, InvokeOutcome, StageMetadata, StageRequest, StagedImage, StagerKind,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image Preview (highest quality).
    ProImagePreview,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImagePreview => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for [`GeminiStager`].
#[derive(Debug, Clone)]
pub struct GeminiStagerBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    timeout: Duration,
}

impl Default for GeminiStagerBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: GeminiModel::default(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiStagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the capability, resolving the API key.
    pub fn build(self) -> Result<GeminiStager> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .ok_or_else(|| {
                StageError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(GeminiStager {
            client,
            api_key,
            model: self.model,
            timeout: self.timeout,
        })
    }
}

/// Gemini image editing capability.
pub struct GeminiStager {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    timeout: Duration,
}

impl GeminiStager {
    /// Creates a new [`GeminiStagerBuilder`].
    pub fn builder() -> GeminiStagerBuilder {
        GeminiStagerBuilder::new()
    }

    async fn invoke_impl(&self, request: &StageRequest) -> Result<InvokeOutcome> {
        validate_request(request, true)?;

        let start = Instant::now();

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model.as_str(),
        );

        let body = GeminiRequest::from_stage_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        // Prompt-level blocks come back as HTTP 200.
        if let Some(ref feedback) = gemini_response.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(StageError::ContentBlocked(msg));
            }
        }

        // A successful call with no candidates is an empty outcome.
        let Some(candidate) = gemini_response.candidates.into_iter().next() else {
            return Ok(InvokeOutcome::Empty);
        };

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(StageError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        // First part with inline image data, in declared response order.
        let inline_data = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .find_map(|p| p.inline_data);

        let Some(inline_data) = inline_data else {
            return Ok(InvokeOutcome::Empty);
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline_data.data)
            .map_err(|e| StageError::Decode(e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;

        let format = match inline_data.mime_type.as_str() {
            "image/jpeg" => ImageFormat::Jpeg,
            "image/webp" => ImageFormat::WebP,
            _ => ImageFormat::Png,
        };

        tracing::debug!(
            model = self.model.as_str(),
            size = data.len(),
            duration_ms,
            "edit complete"
        );

        Ok(InvokeOutcome::Image(StagedImage::new(
            data,
            format,
            StagerKind::Gemini,
            StageMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(duration_ms),
            },
        )))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> StageError {
        if e.is_timeout() {
            StageError::Timeout(self.timeout)
        } else {
            StageError::Network(e)
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> StageError {
        let text = sanitize_error_message(text);
        match status {
            401 => StageError::Auth(text),
            403 => StageError::Permission(text),
            404 => StageError::Api {
                status,
                message: "Model not found. Verify the model name is correct.".into(),
            },
            429 => StageError::RateLimited {
                retry_after: parse_retry_after(headers).map(Duration::from_secs),
            },
            _ => {
                let lower = text.to_lowercase();
                if lower.contains("safety")
                    || lower.contains("blocked")
                    || lower.contains("prohibited")
                {
                    StageError::ContentBlocked(text)
                } else {
                    StageError::Api {
                        status,
                        message: text,
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StagingModel for GeminiStager {
    async fn invoke(&self, request: &StageRequest) -> Result<InvokeOutcome> {
        self.invoke_impl(request).await
    }

    fn kind(&self) -> StagerKind {
        StagerKind::Gemini
    }

    fn model_id(&self) -> &str {
        self.model.as_str()
    }

    fn requires_grounding(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}",
            self.model.as_str(),
        );

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status().as_u16() {
            401 => Err(StageError::Auth("Invalid API key".into())),
            403 => Err(StageError::Permission(
                "API key lacks access to the model".into(),
            )),
            404 => Err(StageError::Api {
                status: 404,
                message: "Model not found. Verify the model name is correct.".into(),
            }),
            s if !(200..300).contains(&s) => Err(StageError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response wire types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    candidate_count: u32,
    temperature: f32,
}

impl GeminiRequest {
    fn from_stage_request(req: &StageRequest) -> Self {
        let mut parts = Vec::new();

        // Reference photo goes first so the [1] marker resolves to it.
        if let Some(ref image_data) = req.reference {
            let mime_type = ImageFormat::from_magic_bytes(image_data)
                .map(|f| f.mime_type())
                .unwrap_or("image/png")
                .to_string();

            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(image_data),
                },
            });
        }

        parts.push(GeminiRequestPart::Text {
            text: req.instruction.clone(),
        });

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                candidate_count: 1,
                // Low temperature keeps the edit close to the reference.
                temperature: 0.1,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::FlashImage.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::ProImagePreview.as_str(),
            "gemini-3-pro-image-preview"
        );
    }

    #[test]
    fn test_gemini_model_default() {
        assert_eq!(GeminiModel::default(), GeminiModel::FlashImage);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let stager = GeminiStagerBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::ProImagePreview)
            .build();
        assert!(stager.is_ok());
    }

    #[test]
    fn test_request_puts_reference_before_text() {
        let png_data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let req = StageRequest::new("Add a blue armchair in [1]").with_reference(png_data);
        let gemini_req = GeminiRequest::from_stage_request(&req);

        assert_eq!(gemini_req.contents.len(), 1);
        let parts = &gemini_req.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], GeminiRequestPart::InlineData { .. }));
        assert!(matches!(parts[1], GeminiRequestPart::Text { .. }));
    }

    #[test]
    fn test_request_config() {
        let req = StageRequest::new("Add a rug in [1]").with_reference(vec![1]);
        let gemini_req = GeminiRequest::from_stage_request(&req);

        assert_eq!(
            gemini_req.generation_config.response_modalities,
            vec!["IMAGE"]
        );
        assert_eq!(gemini_req.generation_config.candidate_count, 1);
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let req = StageRequest::new("Add a rug in [1]").with_reference(vec![1]);
        let gemini_req = GeminiRequest::from_stage_request(&req);
        let json = serde_json::to_value(&gemini_req).unwrap();

        assert!(json.get("generationConfig").is_some());
        assert!(json.get("generation_config").is_none());
        let part = &json["contents"][0]["parts"][0];
        assert!(part.get("inline_data").is_some());
        assert!(part["inline_data"].get("mimeType").is_some());
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": {
                            "mimeType": "image/png",
                            "data": "iVBORw0KGgo="
                        }
                    }]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.candidates.len(), 1);
        assert_eq!(resp.candidates[0].finish_reason.as_deref(), Some("STOP"));

        let content = resp.candidates[0].content.as_ref().unwrap();
        let inline = content.parts[0].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_response_without_image_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{}]
                }
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let content = resp.candidates[0].content.as_ref().unwrap();
        assert!(content.parts[0].inline_data.is_none());
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.candidates.is_empty());
        let feedback = resp.prompt_feedback.unwrap();
        assert_eq!(feedback.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_error_classification() {
        let stager = GeminiStagerBuilder::new().api_key("k").build().unwrap();
        let headers = reqwest::header::HeaderMap::new();

        assert!(matches!(
            stager.parse_error(401, "bad key", &headers),
            StageError::Auth(_)
        ));
        assert!(matches!(
            stager.parse_error(403, "caller does not have permission", &headers),
            StageError::Permission(_)
        ));
        assert!(matches!(
            stager.parse_error(429, "slow down", &headers),
            StageError::RateLimited { .. }
        ));
        assert!(matches!(
            stager.parse_error(500, "blocked by safety system", &headers),
            StageError::ContentBlocked(_)
        ));
        assert!(matches!(
            stager.parse_error(500, "internal", &headers),
            StageError::Api { status: 500, .. }
        ));
    }
}
