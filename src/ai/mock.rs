use super::{GeneratedImage, ImageTransformService, TransformRequest, TransformResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Scripted result of one mock call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Image(Vec<u8>),
    /// A successful call that produced no images.
    Empty,
    /// A `RemoteService` error with this message.
    Fail(String),
}

pub struct MockImageTransformClient {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    call_instants: Arc<Mutex<Vec<Instant>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockImageTransformClient {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            call_instants: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue an outcome; once the queue drains every call returns
    /// [`default_image`].
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.with_outcome(MockOutcome::Fail(message.to_string()))
    }

    pub fn with_image_response(self, image: Vec<u8>) -> Self {
        self.with_outcome(MockOutcome::Image(image))
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.call_instants.lock().unwrap().clone()
    }
}

impl Default for MockImageTransformClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageTransformService for MockImageTransformClient {
    async fn transform_image(&self, request: TransformRequest<'_>) -> Result<TransformResponse> {
        *self.call_count.lock().unwrap() += 1;
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.call_instants.lock().unwrap().push(Instant::now());

        let outcome = self.outcomes.lock().unwrap().pop_front();
        let image_bytes = match outcome {
            Some(MockOutcome::Image(bytes)) => bytes,
            Some(MockOutcome::Empty) => return Ok(TransformResponse::default()),
            Some(MockOutcome::Fail(message)) => return Err(Error::RemoteService(message)),
            None => default_image(),
        };

        Ok(TransformResponse {
            generated_images: vec![GeneratedImage {
                image_bytes,
                mime_type: "image/png".to_string(),
            }],
        })
    }
}

/// A small, valid, patterned 32x32 PNG (well over 100 bytes).
pub fn default_image() -> Vec<u8> {
    let image = RgbImage::from_fn(32, 32, |x, y| {
        Rgb([((x * 7 + y * 13) ^ (x * y)) as u8, (x * 8) as u8, (y * 8) as u8])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("in-memory PNG encoding");
    bytes
}
