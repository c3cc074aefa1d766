use super::client::GeminiHttpClient;
use super::types::{
    InlineImage, OutputOptions, PredictInstance, PredictParameters, PredictRequest,
    PredictResponse,
};
use crate::ai::mime::detect_image_mime;
use crate::ai::{GeneratedImage, ImageTransformService, TransformRequest, TransformResponse};
use crate::models::{Quality, SafetyLevel};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiImageClient {
    http: GeminiHttpClient,
}

impl GeminiImageClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, REQUEST_TIMEOUT, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }
}

fn safety_setting(level: SafetyLevel) -> &'static str {
    match level {
        SafetyLevel::BlockMost => "block_low_and_above",
        SafetyLevel::BlockSome => "block_medium_and_above",
        SafetyLevel::BlockNone => "block_none",
    }
}

fn output_options(quality: Quality) -> OutputOptions {
    match quality {
        Quality::High => OutputOptions {
            mime_type: "image/png".to_string(),
            compression_quality: None,
        },
        Quality::Medium => OutputOptions {
            mime_type: "image/jpeg".to_string(),
            compression_quality: Some(85),
        },
        Quality::Low => OutputOptions {
            mime_type: "image/jpeg".to_string(),
            compression_quality: Some(60),
        },
    }
}

#[async_trait]
impl ImageTransformService for GeminiImageClient {
    async fn transform_image(&self, request: TransformRequest<'_>) -> Result<TransformResponse> {
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: request.prompt.to_string(),
                image: InlineImage {
                    bytes_base64_encoded: base64::engine::general_purpose::STANDARD
                        .encode(request.image),
                    mime_type: detect_image_mime(request.image).to_string(),
                },
            }],
            parameters: PredictParameters {
                sample_count: 1,
                safety_setting: safety_setting(request.safety_level).to_string(),
                output_options: Some(output_options(request.quality)),
            },
        };

        let response: PredictResponse = self.http.predict(&body).await?;

        let mut generated_images = Vec::with_capacity(response.predictions.len());
        for prediction in response.predictions {
            let Some(encoded) = prediction.bytes_base64_encoded else {
                if let Some(reason) = prediction.rai_filtered_reason {
                    tracing::warn!("Gemini filtered a prediction: {}", reason);
                }
                continue;
            };

            let image_bytes = base64::engine::general_purpose::STANDARD
                .decode(&encoded)
                .map_err(|e| {
                    Error::InvalidResponse(format!("Failed to decode Gemini base64 image: {}", e))
                })?;

            generated_images.push(GeneratedImage {
                mime_type: prediction
                    .mime_type
                    .unwrap_or_else(|| detect_image_mime(&image_bytes).to_string()),
                image_bytes,
            });
        }

        tracing::debug!("Gemini returned {} image(s)", generated_images.len());

        Ok(TransformResponse { generated_images })
    }
}
