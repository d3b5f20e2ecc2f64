//! Imagen (Vertex AI) generation capability.
//!
//! Prompt-only text-to-image. An uploaded photo may accompany the request as
//! "before" context in the UI, but it is never sent to this endpoint.

use crate::error::{parse_retry_after, sanitize_error_message, Result, StageError};
use crate::model::client::{validate_request, StagingModel};
use crate::model::types::{
    ImageFormat, InvokeOutcome, StageMetadata, StageRequest, StagedImage, StagerKind,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default Imagen model identifier.
pub const DEFAULT_IMAGEN_MODEL: &str = "imagen-3.0-generate-002";

/// Builder for [`ImagenStager`].
#[derive(Debug, Clone)]
pub struct ImagenStagerBuilder {
    project: Option<String>,
    location: String,
    access_token: Option<String>,
    model: String,
    aspect_ratio: String,
    timeout: Duration,
}

impl Default for ImagenStagerBuilder {
    fn default() -> Self {
        Self {
            project: None,
            location: "us-central1".to_string(),
            access_token: None,
            model: DEFAULT_IMAGEN_MODEL.to_string(),
            aspect_ratio: "4:3".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ImagenStagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the GCP project. Required.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the GCP region. Defaults to `us-central1`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the OAuth access token. Falls back to `GOOGLE_ACCESS_TOKEN` env var.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Overrides the Imagen model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the output aspect ratio. Defaults to `4:3`, which suits interior
    /// photos.
    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }

    /// Sets the per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the capability, resolving project and credentials.
    pub fn build(self) -> Result<ImagenStager> {
        let project = self
            .project
            .ok_or_else(|| StageError::Config("GCP project not set".into()))?;

        let access_token = self
            .access_token
            .or_else(|| std::env::var("GOOGLE_ACCESS_TOKEN").ok())
            .ok_or_else(|| {
                StageError::Auth("GOOGLE_ACCESS_TOKEN not set and no access token provided".into())
            })?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(ImagenStager {
            client,
            project,
            location: self.location,
            access_token,
            model: self.model,
            aspect_ratio: self.aspect_ratio,
            timeout: self.timeout,
        })
    }
}

/// Imagen text-to-image generation capability.
#[derive(Debug)]
pub struct ImagenStager {
    client: reqwest::Client,
    project: String,
    location: String,
    access_token: String,
    model: String,
    aspect_ratio: String,
    timeout: Duration,
}

impl ImagenStager {
    /// Creates a new [`ImagenStagerBuilder`].
    pub fn builder() -> ImagenStagerBuilder {
        ImagenStagerBuilder::new()
    }

    fn endpoint(&self, verb: &str) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/google/models/{model}{verb}",
            loc = self.location,
            proj = self.project,
            model = self.model,
            verb = verb,
        )
    }

    async fn invoke_impl(&self, request: &StageRequest) -> Result<InvokeOutcome> {
        validate_request(request, false)?;

        if request.reference.is_some() {
            tracing::debug!("reference image ignored by generation capability");
        }

        let start = Instant::now();

        let body = ImagenPredictRequest {
            instances: vec![ImagenInstance {
                prompt: request.instruction.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: self.aspect_ratio.clone(),
            },
        };

        let response = self
            .client
            .post(self.endpoint(":predict"))
            .bearer_auth(&self.access_token)
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

        let predict_response: ImagenPredictResponse = response.json().await?;

        // A successful call with zero predictions is an empty outcome.
        let Some(prediction) = predict_response.predictions.into_iter().next() else {
            return Ok(InvokeOutcome::Empty);
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(&prediction.bytes_base64_encoded)
            .map_err(|e| StageError::Decode(e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;

        let format = prediction
            .mime_type
            .as_deref()
            .and_then(|m| match m {
                "image/jpeg" => Some(ImageFormat::Jpeg),
                "image/webp" => Some(ImageFormat::WebP),
                "image/png" => Some(ImageFormat::Png),
                _ => None,
            })
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or(ImageFormat::Png);

        tracing::debug!(
            model = %self.model,
            size = data.len(),
            duration_ms,
            "generation complete"
        );

        Ok(InvokeOutcome::Image(StagedImage::new(
            data,
            format,
            StagerKind::Imagen,
            StageMetadata {
                model: Some(self.model.clone()),
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
            403 => StageError::Permission(format!(
                "model '{}' refused the call, check IAM roles: {}",
                self.model, text
            )),
            404 => StageError::Api {
                status,
                message: "Model not found. Verify the model name is correct.".into(),
            },
            429 => StageError::RateLimited {
                retry_after: parse_retry_after(headers).map(Duration::from_secs),
            },
            _ => {
                let lower = text.to_lowercase();
                if lower.contains("permission") {
                    StageError::Permission(text)
                } else if lower.contains("safety") || lower.contains("blocked") {
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
impl StagingModel for ImagenStager {
    async fn invoke(&self, request: &StageRequest) -> Result<InvokeOutcome> {
        self.invoke_impl(request).await
    }

    fn kind(&self) -> StagerKind {
        StagerKind::Imagen
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint(""))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status().as_u16() {
            401 => Err(StageError::Auth("Invalid access token".into())),
            403 => Err(StageError::Permission(
                "caller does not have permission on the model".into(),
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
struct ImagenPredictRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct ImagenPredictResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    bytes_base64_encoded: String,
    #[serde(default)]
    mime_type: Option<String>,
}
