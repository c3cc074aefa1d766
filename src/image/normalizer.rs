use super::{
    ColorAnalysis, ColorClass, ColorMode, ConvertedImage, ImageMetadata, ImageService,
    NormalizeOptions, NormalizedImage,
};
use crate::models::OutputFormat;
use crate::{Error, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Default)]
pub struct ImageNormalizer {
    processed_count: AtomicU64,
}

impl ImageNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    fn normalize_sync(image_data: &[u8], options: NormalizeOptions) -> Result<NormalizedImage> {
        let format = image::guess_format(image_data)
            .map_err(|e| Error::Decode(format!("Unrecognized image data: {}", e)))?;
        let image = image::load_from_memory_with_format(image_data, format)
            .map_err(|e| Error::Decode(format!("Failed to decode {:?} image: {}", format, e)))?;

        let original_color_mode = ColorMode::from(image.color());

        let image = if options.auto_resize
            && (image.width() > options.max_dimension || image.height() > options.max_dimension)
        {
            let (width, height) =
                fit_within(image.width(), image.height(), options.max_dimension);
            tracing::debug!(
                "Resizing {}x{} image to {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        } else {
            image
        };

        let image = match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let color_analysis = options.analyze_colors.then(|| classify_color(&image));

        let bytes = encode(&image, ImageFormat::Png)?;

        Ok(NormalizedImage {
            bytes,
            metadata: ImageMetadata {
                width: image.width(),
                height: image.height(),
                format: format_name(format),
                color_mode: ColorMode::from(image.color()),
                original_color_mode,
                file_size_mb: image_data.len() as f64 / BYTES_PER_MB,
                color_analysis,
            },
        })
    }

    fn convert_sync(image_data: &[u8], target: OutputFormat) -> Result<ConvertedImage> {
        let image = decode(image_data)?;

        // JPEG has no alpha channel; other targets keep it when present.
        let image = if image.color().has_alpha() && target != OutputFormat::Jpeg {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        };

        Ok(ConvertedImage {
            bytes: encode(&image, target.image_format())?,
            format: target,
        })
    }

    async fn run_blocking<T, F>(task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
    }
}

#[async_trait]
impl ImageService for ImageNormalizer {
    async fn normalize(
        &self,
        image_data: &[u8],
        options: NormalizeOptions,
    ) -> Result<NormalizedImage> {
        let data = image_data.to_vec();
        let normalized = Self::run_blocking(move || Self::normalize_sync(&data, options)).await?;

        self.processed_count.fetch_add(1, Ordering::Relaxed);
        Ok(normalized)
    }

    async fn convert_format(
        &self,
        image_data: &[u8],
        target: OutputFormat,
    ) -> Result<ConvertedImage> {
        let data = image_data.to_vec();
        Self::run_blocking(move || Self::convert_sync(&data, target)).await
    }
}

/// Grayscale when the image is single-channel, or when every RGB plane is
/// entirely zero. Desaturated color photos are reported as `Color`.
pub fn classify_color(image: &DynamicImage) -> ColorAnalysis {
    let color = image.color();
    let is_grayscale = if !color.has_color() {
        true
    } else if color.channel_count() == 3 {
        image.to_rgb8().as_raw().iter().all(|&value| value == 0)
    } else {
        false
    };

    ColorAnalysis {
        is_grayscale,
        color_mode: if is_grayscale {
            ColorClass::Grayscale
        } else {
            ColorClass::Color
        },
    }
}

/// Decode canonical bytes for display; empty input means "no image".
pub fn to_display(image_data: &[u8]) -> Result<Option<DynamicImage>> {
    if image_data.is_empty() {
        return Ok(None);
    }
    decode(image_data).map(Some)
}

fn decode(image_data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(image_data)
        .map_err(|e| Error::Decode(format!("Failed to decode image: {}", e)))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format)?;
    Ok(bytes)
}

/// Scale so the longer side equals `max_dimension`, flooring the shorter side.
fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| -> u32 {
        ((short as u64 * max_dimension as u64) / long as u64).max(1) as u32
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}
