//! Data models and structures
//!
//! Defines the request/response values that flow between the validator, the
//! image normalizer, the generation client and the batch orchestrator.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_RETRY_ATTEMPTS: u32 = 1;
pub const MAX_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            other => Err(Error::Validation(format!(
                "Invalid quality '{}'. Expected one of: high, medium, low",
                other
            ))),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    #[default]
    BlockSome,
    BlockMost,
    BlockNone,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::BlockSome => "block_some",
            SafetyLevel::BlockMost => "block_most",
            SafetyLevel::BlockNone => "block_none",
        }
    }
}

impl FromStr for SafetyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block_some" => Ok(SafetyLevel::BlockSome),
            "block_most" => Ok(SafetyLevel::BlockMost),
            "block_none" => Ok(SafetyLevel::BlockNone),
            other => Err(Error::Validation(format!(
                "Invalid safety level '{}'. Expected one of: block_some, block_most, block_none",
                other
            ))),
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container formats the normalizer can re-encode into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Jpeg,
    #[default]
    Png,
    Webp,
    Bmp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Webp => "WEBP",
            OutputFormat::Bmp => "BMP",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Bmp => "image/bmp",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Webp => image::ImageFormat::WebP,
            OutputFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(OutputFormat::Jpeg),
            "PNG" => Ok(OutputFormat::Png),
            "WEBP" => Ok(OutputFormat::Webp),
            "BMP" => Ok(OutputFormat::Bmp),
            other => Err(Error::UnsupportedFormat(format!(
                "Unsupported format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded image file, passed by value through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// One "transform this image by prompt" call, immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    image: Vec<u8>,
    prompt: String,
    quality: Quality,
    safety_level: SafetyLevel,
    retry_attempts: u32,
}

impl GenerationRequest {
    pub fn new(image: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            quality: Quality::default(),
            safety_level: SafetyLevel::default(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_safety_level(mut self, safety_level: SafetyLevel) -> Self {
        self.safety_level = safety_level;
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Result<Self> {
        if !(MIN_RETRY_ATTEMPTS..=MAX_RETRY_ATTEMPTS).contains(&retry_attempts) {
            return Err(Error::Validation(format!(
                "Retry attempts must be between {} and {}, got {}",
                MIN_RETRY_ATTEMPTS, MAX_RETRY_ATTEMPTS, retry_attempts
            )));
        }
        self.retry_attempts = retry_attempts;
        Ok(self)
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn safety_level(&self) -> SafetyLevel {
        self.safety_level
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }
}

/// Output of one successful generation call.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub image: Vec<u8>,
    pub elapsed: Duration,
    pub attempts: u32,
    pub model: String,
}

/// Process-lifetime usage counters of a generation client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageStatistics {
    pub generation_count: u64,
    pub failed_generations: u64,
    /// Seconds taken by the most recent successful generation.
    pub last_generation_time: Option<f64>,
    pub total_processing_time: f64,
    pub average_generation_time: f64,
    pub model: String,
    pub status: String,
}
