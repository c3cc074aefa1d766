//! Image normalization and format conversion
//!
//! Decodes uploads, bounds their dimensions, converts them to RGB and
//! re-encodes everything to a canonical PNG before it reaches the model.

pub mod mock;
pub mod normalizer;

pub use mock::MockImageProcessor;
pub use normalizer::{classify_color, to_display, ImageNormalizer};

use crate::config::DEFAULT_MAX_DIMENSION;
use crate::models::OutputFormat;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub auto_resize: bool,
    pub analyze_colors: bool,
    /// Longer-side limit applied when `auto_resize` is set.
    pub max_dimension: u32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            auto_resize: false,
            analyze_colors: false,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColorMode {
    #[serde(rename = "L")]
    Grayscale,
    #[serde(rename = "LA")]
    GrayscaleAlpha,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Grayscale => "L",
            ColorMode::GrayscaleAlpha => "LA",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
        }
    }
}

impl From<image::ColorType> for ColorMode {
    fn from(color: image::ColorType) -> Self {
        match (color.has_color(), color.has_alpha()) {
            (false, false) => ColorMode::Grayscale,
            (false, true) => ColorMode::GrayscaleAlpha,
            (true, false) => ColorMode::Rgb,
            (true, true) => ColorMode::Rgba,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColorClass {
    Grayscale,
    Color,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorAnalysis {
    pub is_grayscale: bool,
    pub color_mode: ColorClass,
}

/// Descriptive metadata produced once per normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Container format of the upload, e.g. `"JPEG"`.
    pub format: String,
    /// Color mode of the canonical image (always RGB after normalization).
    pub color_mode: ColorMode,
    pub original_color_mode: ColorMode,
    pub file_size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_analysis: Option<ColorAnalysis>,
}

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Canonical PNG bytes.
    pub bytes: Vec<u8>,
    pub metadata: ImageMetadata,
}

#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn normalize(&self, image_data: &[u8], options: NormalizeOptions)
        -> Result<NormalizedImage>;
    async fn convert_format(&self, image_data: &[u8], target: OutputFormat)
        -> Result<ConvertedImage>;
}
