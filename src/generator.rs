//! Retrying, rate-limited wrapper around the remote image model
//!
//! [`GenerationClient::execute`] is the only way generation requests reach
//! the remote service. It validates input, spaces outbound calls through a
//! shared [`RateLimiter`], retries transient failures with exponential
//! backoff and keeps process-lifetime usage statistics.

use crate::ai::{ImageTransformService, TransformRequest};
use crate::config::DEFAULT_MAX_PROMPT_LENGTH;
use crate::models::{GenerationRequest, GenerationResult, UsageStatistics};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

/// Smallest image payload, in bytes, accepted in either direction.
pub const MIN_IMAGE_BYTES: usize = 100;

/// Error substrings that mark a remote failure as permanent.
pub const FATAL_ERROR_MARKERS: [&str; 6] = [
    "invalid api key",
    "authentication failed",
    "permission denied",
    "model not found",
    "quota exceeded",
    "content policy violation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum spacing between two outbound calls.
    pub min_call_interval: Duration,
    /// Backoff after attempt `n` is `2^n` units. Whole milliseconds, minimum 1.
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Backoff unit in whole milliseconds, never below 1.
    fn backoff_factor_ms(&self) -> u64 {
        u64::try_from(self.backoff_unit.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_call_interval: Duration::from_secs(1),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Global fixed-interval throttle shared by every caller of one client.
///
/// The lock is held across the wait, so concurrent callers queue up and
/// each leaves at least `min_interval` after the previous one.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

#[derive(Debug, Default)]
struct StatsState {
    generation_count: u64,
    failed_generations: u64,
    last_generation_time: Option<Duration>,
    total_processing_time: Duration,
}

pub struct GenerationClient {
    service: Arc<dyn ImageTransformService>,
    model: String,
    policy: RetryPolicy,
    max_prompt_length: usize,
    rate_limiter: RateLimiter,
    stats: Mutex<StatsState>,
}

impl GenerationClient {
    pub fn new(service: Arc<dyn ImageTransformService>, model: impl Into<String>) -> Self {
        let policy = RetryPolicy::default();
        Self {
            service,
            model: model.into(),
            policy,
            max_prompt_length: DEFAULT_MAX_PROMPT_LENGTH,
            rate_limiter: RateLimiter::new(policy.min_call_interval),
            stats: Mutex::new(StatsState::default()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self.rate_limiter = RateLimiter::new(policy.min_call_interval);
        self
    }

    pub fn with_max_prompt_length(mut self, max_prompt_length: usize) -> Self {
        self.max_prompt_length = max_prompt_length;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_ready(&self) -> bool {
        !self.model.is_empty()
    }

    /// Run one generation request to completion.
    ///
    /// Input problems fail with [`Error::InvalidInput`] before any remote
    /// call. Remote failures are retried up to `retry_attempts` total
    /// attempts unless classified fatal, in which case the loop stops at
    /// once with [`Error::FatalRemoteService`].
    pub async fn execute(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.check_input(request)?;

        let attempts = AtomicU32::new(0);
        let total_attempts = request.retry_attempts();

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.policy.backoff_factor_ms())
            .take(total_attempts.saturating_sub(1) as usize);

        let attempts_ref = &attempts;
        let outcome = RetryIf::spawn(
            strategy,
            move || async move {
                let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
                self.attempt(request, attempt).await.map_err(|e| {
                    if !matches!(e, Error::FatalRemoteService(_)) && attempt < total_attempts {
                        warn!(
                            "Generation attempt {}/{} failed: {}. Will retry...",
                            attempt, total_attempts, e
                        );
                    }
                    e
                })
            },
            |e: &Error| !matches!(e, Error::FatalRemoteService(_)),
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);

        match outcome {
            Ok((image, elapsed)) => {
                self.record_success(elapsed);
                info!(
                    "Generation succeeded after {} attempt(s) in {:.2}s",
                    attempts,
                    elapsed.as_secs_f64()
                );
                Ok(GenerationResult {
                    image,
                    elapsed,
                    attempts,
                    model: self.model.clone(),
                })
            }
            Err(e) => {
                self.record_failure();
                error!("Generation failed after {} attempt(s): {}", attempts, e);
                Err(e)
            }
        }
    }

    pub fn statistics(&self) -> UsageStatistics {
        let stats = self.lock_stats();
        let total = stats.total_processing_time.as_secs_f64();
        let average = if stats.generation_count > 0 {
            total / stats.generation_count as f64
        } else {
            0.0
        };

        UsageStatistics {
            generation_count: stats.generation_count,
            failed_generations: stats.failed_generations,
            last_generation_time: stats.last_generation_time.map(|d| d.as_secs_f64()),
            total_processing_time: total,
            average_generation_time: average,
            model: self.model.clone(),
            status: if self.is_ready() { "ready" } else { "unavailable" }.to_string(),
        }
    }

    fn check_input(&self, request: &GenerationRequest) -> Result<()> {
        if request.image().len() < MIN_IMAGE_BYTES {
            return Err(Error::InvalidInput(format!(
                "Image data too small ({} bytes, minimum {})",
                request.image().len(),
                MIN_IMAGE_BYTES
            )));
        }

        if request.prompt().trim().is_empty() {
            return Err(Error::InvalidInput("Style prompt cannot be empty".to_string()));
        }

        if request.prompt().chars().count() > self.max_prompt_length {
            return Err(Error::InvalidInput(format!(
                "Style prompt too long. Max {} characters",
                self.max_prompt_length
            )));
        }

        Ok(())
    }

    /// One remote call. The returned duration covers the call and response
    /// checks only, never the rate-limit wait or backoff.
    async fn attempt(&self, request: &GenerationRequest, attempt: u32) -> Result<(Vec<u8>, Duration)> {
        self.rate_limiter.acquire().await;
        let started = Instant::now();

        tracing::debug!("Generation attempt {} for model {}", attempt, self.model);

        let response = self
            .service
            .transform_image(TransformRequest {
                image: request.image(),
                prompt: request.prompt(),
                quality: request.quality(),
                safety_level: request.safety_level(),
            })
            .await
            .map_err(classify)?;

        let image = response
            .generated_images
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("No image generated".to_string()))?;

        if image.image_bytes.len() < MIN_IMAGE_BYTES {
            return Err(Error::InvalidResponse(format!(
                "Generated image too small ({} bytes)",
                image.image_bytes.len()
            )));
        }

        Ok((image.image_bytes, started.elapsed()))
    }

    fn record_success(&self, elapsed: Duration) {
        let mut stats = self.lock_stats();
        stats.generation_count += 1;
        stats.last_generation_time = Some(elapsed);
        stats.total_processing_time += elapsed;
    }

    fn record_failure(&self) {
        self.lock_stats().failed_generations += 1;
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, StatsState> {
        // Counters stay consistent even if a holder panicked.
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Promote remote errors carrying a fatal marker to [`Error::FatalRemoteService`].
pub fn classify(error: Error) -> Error {
    match error {
        Error::RemoteService(message) if is_fatal_message(&message) => {
            Error::FatalRemoteService(message)
        }
        other => other,
    }
}

pub fn is_fatal_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    FATAL_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::default_image;
    use crate::ai::{MockImageTransformClient, MockOutcome};
    use crate::models::{Quality, SafetyLevel};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            min_call_interval: Duration::from_millis(1),
            backoff_unit: Duration::from_millis(1),
        }
    }

    fn make_client(mock: Arc<MockImageTransformClient>) -> GenerationClient {
        GenerationClient::new(mock, "imagen-test").with_policy(fast_policy())
    }

    fn request(attempts: u32) -> GenerationRequest {
        GenerationRequest::new(default_image(), "vivid autumn colors")
            .with_quality(Quality::Medium)
            .with_safety_level(SafetyLevel::BlockMost)
            .with_retry_attempts(attempts)
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mock = Arc::new(MockImageTransformClient::new());
        let client = make_client(mock.clone());

        let result = client.execute(&request(3)).await.unwrap();

        assert_eq!(result.image, default_image());
        assert_eq!(result.attempts, 1);
        assert_eq!(result.model, "imagen-test");
        assert_eq!(mock.get_call_count(), 1);
        assert_eq!(mock.received_prompts(), vec!["vivid autumn colors"]);

        let stats = client.statistics();
        assert_eq!(stats.generation_count, 1);
        assert_eq!(stats.failed_generations, 0);
        assert!(stats.last_generation_time.is_some());
        assert_eq!(stats.status, "ready");
    }

    #[tokio::test]
    async fn test_fatal_error_stops_after_one_call() {
        let mock = Arc::new(MockImageTransformClient::new().with_failure("Quota exceeded for project"));
        let client = make_client(mock.clone());

        let err = client.execute(&request(5)).await.unwrap_err();

        assert!(matches!(err, Error::FatalRemoteService(_)));
        assert_eq!(mock.get_call_count(), 1);
        assert_eq!(client.statistics().generation_count, 0);
        assert_eq!(client.statistics().failed_generations, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success_counts_once() {
        let mock = Arc::new(
            MockImageTransformClient::new()
                .with_failure("Service temporarily unavailable")
                .with_failure("Deadline exceeded"),
        );
        let client = make_client(mock.clone());

        let result = client.execute(&request(3)).await.unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(mock.get_call_count(), 3);
        assert_eq!(client.statistics().generation_count, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let mock = Arc::new(
            MockImageTransformClient::new()
                .with_failure("first")
                .with_failure("second")
                .with_failure("third"),
        );
        let client = make_client(mock.clone());

        let err = client.execute(&request(3)).await.unwrap_err();

        match err {
            Error::RemoteService(message) => assert_eq!(message, "third"),
            other => panic!("expected remote service error, got {:?}", other),
        }
        assert_eq!(mock.get_call_count(), 3);
        assert_eq!(client.statistics().generation_count, 0);
        assert_eq!(client.statistics().failed_generations, 1);
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let mock = Arc::new(MockImageTransformClient::new().with_failure("flaky"));
        let client = make_client(mock.clone());

        assert!(client.execute(&request(1)).await.is_err());
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_response_is_retried() {
        let mock = Arc::new(
            MockImageTransformClient::new()
                .with_outcome(MockOutcome::Empty)
                .with_image_response(vec![0u8; 10]),
        );
        let client = make_client(mock.clone());

        let result = client.execute(&request(3)).await.unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.image, default_image());
    }

    #[tokio::test]
    async fn test_undersized_response_is_invalid() {
        let mock = Arc::new(MockImageTransformClient::new().with_image_response(vec![0u8; 99]));
        let client = make_client(mock);

        let err = client.execute(&request(1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_call() {
        let mock = Arc::new(MockImageTransformClient::new());
        let client = make_client(mock.clone()).with_max_prompt_length(10);

        let tiny = GenerationRequest::new(vec![0u8; 99], "red");
        assert!(matches!(client.execute(&tiny).await, Err(Error::InvalidInput(_))));

        let blank = GenerationRequest::new(default_image(), "   ");
        assert!(matches!(client.execute(&blank).await, Err(Error::InvalidInput(_))));

        let long = GenerationRequest::new(default_image(), "x".repeat(11));
        assert!(matches!(client.execute(&long).await, Err(Error::InvalidInput(_))));

        assert_eq!(mock.get_call_count(), 0);
        assert_eq!(client.statistics().failed_generations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let mock = Arc::new(
            MockImageTransformClient::new()
                .with_failure("unavailable")
                .with_failure("unavailable"),
        );
        let client = GenerationClient::new(mock.clone(), "imagen-test");

        client.execute(&request(3)).await.unwrap();

        let calls = mock.call_instants();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_secs(2));
        assert!(calls[2] - calls[1] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_excludes_backoff_and_rate_limit_waits() {
        let mock = Arc::new(
            MockImageTransformClient::new()
                .with_failure("unavailable")
                .with_failure("unavailable"),
        );
        let client = GenerationClient::new(mock, "imagen-test");

        let result = client.execute(&request(3)).await.unwrap();
        assert!(result.elapsed < Duration::from_secs(1));

        let stats = client.statistics();
        assert!(stats.last_generation_time.unwrap() < 1.0);
        assert!(stats.total_processing_time < 1.0);
        assert!(stats.average_generation_time < 1.0);
    }

    #[test]
    fn test_backoff_factor_never_truncates_to_zero() {
        let sub_millisecond = RetryPolicy {
            min_call_interval: Duration::ZERO,
            backoff_unit: Duration::from_micros(200),
        };
        assert_eq!(sub_millisecond.backoff_factor_ms(), 1);
        assert_eq!(RetryPolicy::default().backoff_factor_ms(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_concurrent_callers() {
        let mock = Arc::new(MockImageTransformClient::new());
        let client = Arc::new(GenerationClient::new(mock.clone(), "imagen-test"));

        let first = request(1);
        let second = request(1);
        let (a, b) = tokio::join!(client.execute(&first), client.execute(&second));
        a.unwrap();
        b.unwrap();

        let mut calls = mock.call_instants();
        calls.sort();
        assert!(calls[1] - calls[0] >= Duration::from_secs(1));
        assert_eq!(client.statistics().generation_count, 2);
    }

    #[test]
    fn test_fatal_classification_is_case_insensitive() {
        assert!(is_fatal_message("INVALID API KEY supplied"));
        assert!(is_fatal_message("Content Policy Violation detected"));
        assert!(!is_fatal_message("503 Service Unavailable"));

        assert!(matches!(
            classify(Error::RemoteService("Permission Denied".to_string())),
            Error::FatalRemoteService(_)
        ));
        assert!(matches!(
            classify(Error::InvalidResponse("model not found".to_string())),
            Error::InvalidResponse(_)
        ));
    }
}
