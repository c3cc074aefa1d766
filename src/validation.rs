//! Input validation performed before any decoding or network call.

use crate::config::{Config, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_PROMPT_LENGTH};
use crate::models::UploadedImage;
use crate::{Error, Result};

pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_prompt_length: usize,
    pub max_image_bytes: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_prompt_length: DEFAULT_MAX_PROMPT_LENGTH,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl From<&Config> for ValidationLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_prompt_length: config.max_prompt_length,
            max_image_bytes: config.max_image_bytes,
        }
    }
}

pub fn validate_prompt(prompt: &str, max_length: usize) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(Error::Validation("Prompt cannot be empty".to_string()));
    }

    if prompt.chars().count() > max_length {
        return Err(Error::Validation(format!(
            "Prompt too long. Max {} characters",
            max_length
        )));
    }

    Ok(())
}

pub fn validate_image(upload: &UploadedImage, limits: &ValidationLimits) -> Result<()> {
    if upload.bytes.is_empty() {
        return Err(Error::Validation("No file uploaded".to_string()));
    }

    if upload.size() > limits.max_image_bytes {
        return Err(Error::Validation(format!(
            "File too large. Max size: {}MB",
            limits.max_image_bytes / (1024 * 1024)
        )));
    }

    let content_type = upload.content_type.to_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(Error::Validation(format!(
            "Unsupported file type '{}'. Allowed: {}",
            upload.content_type,
            ALLOWED_CONTENT_TYPES.join(", ")
        )));
    }

    Ok(())
}
