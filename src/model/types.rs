//! Core types for staging calls.

use crate::error::{Result, StageError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats for uploads and staged outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless). All staged outputs are persisted as PNG.
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Staging capability kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagerKind {
    /// Gemini image editing, grounded on a reference photo.
    Gemini,
    /// Imagen text-to-image generation.
    Imagen,
}

impl std::fmt::Display for StagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Imagen => write!(f, "imagen"),
        }
    }
}

/// A request to stage a photo: an instruction plus an optional reference image.
#[derive(Debug, Clone)]
pub struct StageRequest {
    /// The staging or editing instruction.
    pub instruction: String,
    /// Reference photo bytes to ground the edit on.
    ///
    /// Required by the Gemini editing capability, ignored by Imagen generation.
    pub reference: Option<Vec<u8>>,
}

impl StageRequest {
    /// Creates a new request with the given instruction.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            reference: None,
        }
    }

    /// Attaches a reference image to ground the edit on.
    pub fn with_reference(mut self, image: Vec<u8>) -> Self {
        self.reference = Some(image);
        self
    }
}

/// Metadata about a staging call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageMetadata {
    /// Model identifier that produced the image.
    pub model: Option<String>,
    /// Call duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A staged image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "staged image should be saved or persisted"]
pub struct StagedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Capability that produced this image.
    pub stager: StagerKind,
    /// Call metadata.
    pub metadata: StageMetadata,
}

impl StagedImage {
    /// Creates a new staged image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        stager: StagerKind,
        metadata: StageMetadata,
    ) -> Self {
        Self {
            data,
            format,
            stager,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Outcome of a staging call that completed without a transport error.
///
/// A remote call can succeed yet return zero images; that is a valid empty
/// outcome, not a failure, and callers must message it distinctly.
#[derive(Debug, Clone)]
pub enum InvokeOutcome {
    /// The call returned at least one image; this is the first one, extracted
    /// in declared response order.
    Image(StagedImage),
    /// The call succeeded but the response contained no image payloads.
    Empty,
}

impl InvokeOutcome {
    /// Returns the staged image, or an error if the outcome was empty.
    pub fn into_image(self) -> Result<StagedImage> {
        match self {
            Self::Image(image) => Ok(image),
            Self::Empty => Err(StageError::Decode("response contained no image".into())),
        }
    }
}
