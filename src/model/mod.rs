//! Remote staging capabilities.

mod client;
mod gemini;
mod imagen;
mod types;

pub use client::{validate_request, StagingModel, StagingModelExt};
pub use gemini::{GeminiModel, GeminiStager, GeminiStagerBuilder};
pub use imagen::{ImagenStager, ImagenStagerBuilder, DEFAULT_IMAGEN_MODEL};
pub use types::{
    ImageFormat, InvokeOutcome, StageMetadata, StageRequest, StagedImage, StagerKind,
};
