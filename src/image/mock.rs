use super::{ColorMode, ConvertedImage, ImageMetadata, ImageService, NormalizeOptions, NormalizedImage};
use crate::models::OutputFormat;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Pass-through processor that returns its input untouched.
pub struct MockImageProcessor {
    normalize_count: Arc<Mutex<usize>>,
    convert_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
    should_panic: Arc<Mutex<bool>>,
    dimensions: (u32, u32),
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            normalize_count: Arc::new(Mutex::new(0)),
            convert_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            should_panic: Arc::new(Mutex::new(false)),
            dimensions: (512, 512),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Panic inside `normalize`, for exercising task supervision.
    pub fn with_panic(self, should_panic: bool) -> Self {
        *self.should_panic.lock().unwrap() = should_panic;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = (width, height);
        self
    }

    pub fn get_normalize_count(&self) -> usize {
        *self.normalize_count.lock().unwrap()
    }

    pub fn get_convert_count(&self) -> usize {
        *self.convert_count.lock().unwrap()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    async fn normalize(
        &self,
        image_data: &[u8],
        options: NormalizeOptions,
    ) -> Result<NormalizedImage> {
        if *self.should_panic.lock().unwrap() {
            panic!("Mock image processor panic");
        }
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Decode("Mock failure".to_string()));
        }

        *self.normalize_count.lock().unwrap() += 1;

        Ok(NormalizedImage {
            bytes: image_data.to_vec(),
            metadata: ImageMetadata {
                width: self.dimensions.0,
                height: self.dimensions.1,
                format: "PNG".to_string(),
                color_mode: ColorMode::Rgb,
                original_color_mode: ColorMode::Rgb,
                file_size_mb: image_data.len() as f64 / (1024.0 * 1024.0),
                color_analysis: options.analyze_colors.then(|| super::ColorAnalysis {
                    is_grayscale: false,
                    color_mode: super::ColorClass::Color,
                }),
            },
        })
    }

    async fn convert_format(
        &self,
        image_data: &[u8],
        target: OutputFormat,
    ) -> Result<ConvertedImage> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Decode("Mock failure".to_string()));
        }

        *self.convert_count.lock().unwrap() += 1;

        Ok(ConvertedImage {
            bytes: image_data.to_vec(),
            format: target,
        })
    }
}
