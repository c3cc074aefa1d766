use crate::ai::mime::sniff_format;
use crate::ai::{GeminiImageClient, ImageTransformService};
use crate::batch::{new_job_id, BatchJob, BatchOrchestrator, BatchSettings};
use crate::config::{Config, DEFAULT_MAX_DIMENSION, DEFAULT_MODEL_NAME};
use crate::generator::{GenerationClient, RetryPolicy};
use crate::image::{ImageMetadata, ImageNormalizer, ImageService, NormalizeOptions};
use crate::models::{
    GenerationRequest, OutputFormat, Quality, SafetyLevel, UploadedImage, UsageStatistics,
    DEFAULT_RETRY_ATTEMPTS,
};
use crate::spelling::{SpellChecker, SpellCheckerStats, SpellingIssue};
use crate::validation::{validate_image, validate_prompt, ValidationLimits};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_MONTHLY_QUOTA: u64 = 1000;
const USAGE_PLAN: &str = "pro";

/// Runs the colorization pipeline: validate, spell-correct, normalize,
/// generate and convert.
pub struct App {
    spell_checker: SpellChecker,
    image: Arc<dyn ImageService>,
    generator: Arc<GenerationClient>,
    batch: BatchOrchestrator,
    limits: ValidationLimits,
    max_dimension: u32,
    defaults: ColorizeOptions,
    monthly_quota: u64,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub transformer: Arc<dyn ImageTransformService>,
    pub image: Arc<dyn ImageService>,
    pub model: String,
    pub policy: RetryPolicy,
    pub limits: ValidationLimits,
    pub max_dimension: u32,
    pub defaults: ColorizeOptions,
    pub monthly_quota: u64,
    pub job_retention: Option<Duration>,
}

impl AppServices {
    pub fn new(transformer: Arc<dyn ImageTransformService>, image: Arc<dyn ImageService>) -> Self {
        Self {
            transformer,
            image,
            model: DEFAULT_MODEL_NAME.to_string(),
            policy: RetryPolicy::default(),
            limits: ValidationLimits::default(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            defaults: ColorizeOptions::default(),
            monthly_quota: DEFAULT_MONTHLY_QUOTA,
            job_retention: None,
        }
    }
}

/// Per-request knobs for a single colorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorizeOptions {
    pub quality: Quality,
    pub safety_level: SafetyLevel,
    pub output_format: OutputFormat,
    pub retry_attempts: u32,
}

impl Default for ColorizeOptions {
    fn default() -> Self {
        Self {
            quality: Quality::High,
            safety_level: SafetyLevel::BlockSome,
            output_format: OutputFormat::Png,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorizeOutcome {
    pub generation_id: String,
    pub image: Vec<u8>,
    pub format: OutputFormat,
    pub processing_time: Duration,
    pub attempts: u32,
    pub model: String,
    /// Metadata of the normalized source image.
    pub source: ImageMetadata,
    pub prompt_used: String,
    pub spelling_issues: Vec<SpellingIssue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageMetrics {
    pub total_generations: u64,
    pub failed_generations: u64,
    /// `None` until the first generation finishes either way.
    pub success_rate: Option<f64>,
    pub average_processing_time: f64,
    pub total_processing_time: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageReport {
    pub plan: &'static str,
    pub monthly_quota: u64,
    pub requests_used: u64,
    pub requests_remaining: u64,
    pub metrics: UsageMetrics,
    pub spelling: SpellCheckerStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthComponents {
    pub reactor_agent: &'static str,
    pub image_processor: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub components: HealthComponents,
}

pub fn new_generation_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("gen_{}", &id[..12])
}

impl App {
    pub fn from_config(config: &Config) -> Self {
        let mut client =
            GeminiImageClient::new(config.gemini_api_key.clone(), config.model_name.clone());
        if let Some(base_url) = &config.gemini_base_url {
            client = client.with_base_url(base_url.clone());
        }

        Self::with_services(AppServices {
            transformer: Arc::new(client),
            image: Arc::new(ImageNormalizer::new()),
            model: config.model_name.clone(),
            policy: RetryPolicy {
                min_call_interval: config.min_call_interval,
                ..RetryPolicy::default()
            },
            limits: ValidationLimits::from(config),
            max_dimension: config.max_dimension,
            defaults: ColorizeOptions {
                quality: config.default_quality,
                safety_level: config.default_safety_level,
                output_format: OutputFormat::Png,
                retry_attempts: config.default_retry_attempts,
            },
            monthly_quota: config.monthly_quota,
            job_retention: config.job_retention,
        })
    }

    pub fn with_services(services: AppServices) -> Self {
        let generator = Arc::new(
            GenerationClient::new(services.transformer, services.model)
                .with_policy(services.policy)
                .with_max_prompt_length(services.limits.max_prompt_length),
        );

        let batch = BatchOrchestrator::new(generator.clone(), services.image.clone())
            .with_settings(BatchSettings {
                quality: services.defaults.quality,
                safety_level: services.defaults.safety_level,
                retry_attempts: services.defaults.retry_attempts,
                normalize: NormalizeOptions {
                    max_dimension: services.max_dimension,
                    ..NormalizeOptions::default()
                },
                limits: services.limits,
            })
            .with_retention(services.job_retention);

        Self {
            spell_checker: SpellChecker::new(),
            image: services.image,
            generator,
            batch,
            limits: services.limits,
            max_dimension: services.max_dimension,
            defaults: services.defaults,
            monthly_quota: services.monthly_quota,
        }
    }

    pub fn default_options(&self) -> ColorizeOptions {
        self.defaults
    }

    pub fn limits(&self) -> ValidationLimits {
        self.limits
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub async fn colorize(
        &self,
        upload: UploadedImage,
        prompt: &str,
        options: ColorizeOptions,
    ) -> Result<ColorizeOutcome> {
        validate_image(&upload, &self.limits)?;
        validate_prompt(prompt, self.limits.max_prompt_length)?;

        let (prompt_used, spelling_issues) = self.spell_checker.check(prompt);

        let normalized = self
            .image
            .normalize(
                &upload.bytes,
                NormalizeOptions {
                    auto_resize: true,
                    analyze_colors: true,
                    max_dimension: self.max_dimension,
                },
            )
            .await?;

        info!(
            "Colorizing {} ({}x{} {})",
            upload.filename,
            normalized.metadata.width,
            normalized.metadata.height,
            normalized.metadata.format
        );

        let request = GenerationRequest::new(normalized.bytes, prompt_used.clone())
            .with_quality(options.quality)
            .with_safety_level(options.safety_level)
            .with_retry_attempts(options.retry_attempts)?;

        let generated = self.generator.execute(&request).await?;

        let image = if sniff_format(&generated.image) == Some(options.output_format) {
            generated.image
        } else {
            self.image
                .convert_format(&generated.image, options.output_format)
                .await?
                .bytes
        };

        Ok(ColorizeOutcome {
            generation_id: new_generation_id(),
            image,
            format: options.output_format,
            processing_time: generated.elapsed,
            attempts: generated.attempts,
            model: generated.model,
            source: normalized.metadata,
            prompt_used,
            spelling_issues,
        })
    }

    pub fn check_prompt(&self, prompt: &str) -> (String, Vec<SpellingIssue>) {
        self.spell_checker.check(prompt)
    }

    pub fn submit_batch(
        &self,
        items: Vec<UploadedImage>,
        prompt: &str,
        concurrency: usize,
    ) -> Result<BatchJob> {
        validate_prompt(prompt, self.limits.max_prompt_length)?;
        let (prompt_used, _) = self.spell_checker.check(prompt);
        self.batch.submit(new_job_id(), items, &prompt_used, concurrency)
    }

    pub fn job_status(&self, job_id: &str) -> Result<BatchJob> {
        self.batch.get_status(job_id)
    }

    pub fn statistics(&self) -> UsageStatistics {
        self.generator.statistics()
    }

    pub fn usage(&self) -> UsageReport {
        let stats = self.generator.statistics();
        let finished = stats.generation_count + stats.failed_generations;

        UsageReport {
            plan: USAGE_PLAN,
            monthly_quota: self.monthly_quota,
            requests_used: stats.generation_count,
            requests_remaining: self.monthly_quota.saturating_sub(stats.generation_count),
            metrics: UsageMetrics {
                total_generations: stats.generation_count,
                failed_generations: stats.failed_generations,
                success_rate: (finished > 0)
                    .then(|| stats.generation_count as f64 / finished as f64),
                average_processing_time: stats.average_generation_time,
                total_processing_time: stats.total_processing_time,
            },
            spelling: self.spell_checker.stats(),
        }
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: Utc::now(),
            components: HealthComponents {
                reactor_agent: if self.generator.is_ready() { "operational" } else { "offline" },
                image_processor: "operational",
            },
        }
    }
}
