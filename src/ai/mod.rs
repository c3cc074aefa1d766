//! Remote image transformation
//!
//! Abstracts the hosted image model behind [`ImageTransformService`] so the
//! generation client can be exercised against [`MockImageTransformClient`].

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::GeminiImageClient;
pub use mock::{MockImageTransformClient, MockOutcome};

use crate::models::{Quality, SafetyLevel};
use crate::Result;
use async_trait::async_trait;

/// One transform call: a source image and the style to apply to it.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub image: &'a [u8],
    pub prompt: &'a str,
    pub quality: Quality,
    pub safety_level: SafetyLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResponse {
    pub generated_images: Vec<GeneratedImage>,
}

impl TransformResponse {
    pub fn first_image(&self) -> Option<&GeneratedImage> {
        self.generated_images.first()
    }
}

#[async_trait]
pub trait ImageTransformService: Send + Sync {
    async fn transform_image(&self, request: TransformRequest<'_>) -> Result<TransformResponse>;
}
