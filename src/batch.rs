//! Background batch processing with per-job progress tracking
//!
//! A submitted job fans its images out over a bounded number of concurrent
//! workers. Each image succeeds or fails on its own; only a failure of the
//! orchestration itself marks the whole job as failed.

use crate::generator::GenerationClient;
use crate::image::{ImageMetadata, ImageService, NormalizeOptions};
use crate::models::{GenerationRequest, Quality, SafetyLevel, UploadedImage, DEFAULT_RETRY_ATTEMPTS};
use crate::validation::{validate_image, validate_prompt, ValidationLimits};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const MAX_BATCH_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItemResult {
    pub index: usize,
    pub original_filename: String,
    pub status: ItemStatus,
    pub success: bool,
    /// Hex-encoded generated image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_info: Option<ImageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    fn pending(index: usize, original_filename: &str) -> Self {
        Self {
            index,
            original_filename: original_filename.to_string(),
            status: ItemStatus::Pending,
            success: false,
            image_data: None,
            processing_time: 0.0,
            image_info: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJob {
    pub job_id: String,
    pub status: JobStatus,
    /// Percentage of finished items, 0-100.
    pub progress: u8,
    pub total_images: usize,
    pub processed_images: usize,
    pub results: Vec<BatchItemResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    pub fn successful_items(&self) -> usize {
        self.results.iter().filter(|r| r.status == ItemStatus::Success).count()
    }

    pub fn failed_items(&self) -> usize {
        self.results.iter().filter(|r| r.status == ItemStatus::Failure).count()
    }
}

/// Settings applied to every image of a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub quality: Quality,
    pub safety_level: SafetyLevel,
    pub retry_attempts: u32,
    pub normalize: NormalizeOptions,
    pub limits: ValidationLimits,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            quality: Quality::High,
            safety_level: SafetyLevel::BlockSome,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            normalize: NormalizeOptions::default(),
            limits: ValidationLimits::default(),
        }
    }
}

pub fn new_job_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("batch_{}", &id[..12])
}

/// Owns the in-process job registry. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BatchOrchestrator {
    generator: Arc<GenerationClient>,
    image: Arc<dyn ImageService>,
    settings: BatchSettings,
    retention: Option<Duration>,
    jobs: Arc<Mutex<HashMap<String, BatchJob>>>,
}

impl BatchOrchestrator {
    pub fn new(generator: Arc<GenerationClient>, image: Arc<dyn ImageService>) -> Self {
        Self {
            generator,
            image,
            settings: BatchSettings::default(),
            retention: None,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Evict finished jobs older than `retention` whenever a job is submitted.
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// Register a job and start processing it in the background.
    ///
    /// Returns the initial snapshot (`processing`, every item `pending`).
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        job_id: impl Into<String>,
        items: Vec<UploadedImage>,
        prompt: &str,
        concurrency: usize,
    ) -> Result<BatchJob> {
        let job_id = job_id.into();

        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(Error::Validation(format!(
                "Concurrency must be between {} and {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY
            )));
        }
        if items.is_empty() {
            return Err(Error::Validation("No images provided".to_string()));
        }
        if items.len() > MAX_BATCH_IMAGES {
            return Err(Error::Validation(format!(
                "Maximum {} images per batch",
                MAX_BATCH_IMAGES
            )));
        }
        validate_prompt(prompt, self.settings.limits.max_prompt_length)?;

        let now = Utc::now();
        let job = BatchJob {
            job_id: job_id.clone(),
            status: JobStatus::Processing,
            progress: 0,
            total_images: items.len(),
            processed_images: 0,
            results: items
                .iter()
                .enumerate()
                .map(|(index, item)| BatchItemResult::pending(index, &item.filename))
                .collect(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        {
            let mut jobs = self.lock_jobs();
            if jobs.contains_key(&job_id) {
                return Err(Error::Validation(format!("Job {} already exists", job_id)));
            }
            self.evict_expired(&mut jobs);
            jobs.insert(job_id.clone(), job.clone());
        }

        info!(
            "Batch job {} submitted: {} image(s), concurrency {}",
            job_id,
            items.len(),
            concurrency
        );

        let worker = {
            let orchestrator = self.clone();
            let job_id = job_id.clone();
            let prompt = prompt.to_string();
            tokio::spawn(async move { orchestrator.run(&job_id, items, &prompt, concurrency).await })
        };

        let supervisor = self.clone();
        tokio::spawn(async move {
            let failure = match worker.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("Batch processing aborted: {}", e)),
            };
            if let Some(message) = failure {
                error!("Batch job {} failed: {}", job_id, message);
                supervisor.fail_job(&job_id, message);
            }
        });

        Ok(job)
    }

    pub fn get_status(&self, job_id: &str) -> Result<BatchJob> {
        self.lock_jobs()
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    pub fn job_count(&self) -> usize {
        self.lock_jobs().len()
    }

    async fn run(
        &self,
        job_id: &str,
        items: Vec<UploadedImage>,
        prompt: &str,
        concurrency: usize,
    ) -> Result<()> {
        let semaphore = Semaphore::new(concurrency);

        let tasks = items.into_iter().enumerate().map(|(index, item)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| Error::Invariant(format!("Batch semaphore closed: {}", e)))?;
                let result = self.process_item(index, item, prompt).await;
                self.record_item(job_id, result);
                Ok::<(), Error>(())
            }
        });

        try_join_all(tasks).await?;
        self.complete_job(job_id);
        Ok(())
    }

    async fn process_item(&self, index: usize, item: UploadedImage, prompt: &str) -> BatchItemResult {
        let started = Instant::now();
        let mut result = BatchItemResult::pending(index, &item.filename);

        match self.generate(&item, prompt).await {
            Ok((image, metadata)) => {
                result.status = ItemStatus::Success;
                result.success = true;
                result.image_data = Some(hex::encode(image));
                result.image_info = Some(metadata);
            }
            Err(e) => {
                warn!("Batch item {} ({}) failed: {}", index, item.filename, e);
                result.status = ItemStatus::Failure;
                result.error = Some(e.to_string());
            }
        }

        result.processing_time = started.elapsed().as_secs_f64();
        result
    }

    async fn generate(&self, item: &UploadedImage, prompt: &str) -> Result<(Vec<u8>, ImageMetadata)> {
        validate_image(item, &self.settings.limits)?;

        let normalized = self.image.normalize(&item.bytes, self.settings.normalize).await?;

        let request = GenerationRequest::new(normalized.bytes, prompt)
            .with_quality(self.settings.quality)
            .with_safety_level(self.settings.safety_level)
            .with_retry_attempts(self.settings.retry_attempts)?;

        let generated = self.generator.execute(&request).await?;
        Ok((generated.image, normalized.metadata))
    }

    fn record_item(&self, job_id: &str, result: BatchItemResult) {
        let mut jobs = self.lock_jobs();
        let Some(job) = jobs.get_mut(job_id) else {
            return;
        };

        let index = result.index;
        if let Some(slot) = job.results.get_mut(index) {
            *slot = result;
        }
        job.processed_images = (job.processed_images + 1).min(job.total_images);
        job.progress = ((job.processed_images * 100) / job.total_images.max(1)) as u8;
        job.updated_at = Utc::now();
    }

    fn complete_job(&self, job_id: &str) {
        let mut jobs = self.lock_jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.processed_images = job.total_images;
            job.updated_at = Utc::now();
            info!(
                "Batch job {} completed: {} succeeded, {} failed",
                job_id,
                job.successful_items(),
                job.failed_items()
            );
        }
    }

    fn fail_job(&self, job_id: &str, message: String) {
        let mut jobs = self.lock_jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.updated_at = Utc::now();
        }
    }

    fn evict_expired(&self, jobs: &mut HashMap<String, BatchJob>) {
        let Some(retention) = self.retention else {
            return;
        };

        let now = Utc::now();
        let before = jobs.len();
        jobs.retain(|_, job| {
            let expired = job.status.is_terminal()
                && (now - job.updated_at)
                    .to_std()
                    .map(|age| age >= retention)
                    .unwrap_or(false);
            !expired
        });

        let evicted = before - jobs.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} expired batch job(s)", evicted);
        }
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, BatchJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
