//! Process configuration loaded once at startup.

use crate::models::{
    Quality, SafetyLevel, DEFAULT_RETRY_ATTEMPTS, MAX_RETRY_ATTEMPTS, MIN_RETRY_ATTEMPTS,
};
use crate::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL_NAME: &str = "imagen-3.0-generate-002";
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 2000;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: Option<String>,
    pub model_name: String,
    pub max_prompt_length: usize,
    pub max_image_bytes: usize,
    /// Longer-side threshold used when auto-resizing uploads.
    pub max_dimension: u32,
    pub default_quality: Quality,
    pub default_safety_level: SafetyLevel,
    pub default_retry_attempts: u32,
    pub min_call_interval: Duration,
    pub host: String,
    pub port: u16,
    pub monthly_quota: u64,
    /// How long finished batch jobs are kept; `None` keeps them forever.
    pub job_retention: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY not found in environment variables".to_string())
            })?;

        let default_retry_attempts =
            parse_or(&lookup, "DEFAULT_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?;
        if !(MIN_RETRY_ATTEMPTS..=MAX_RETRY_ATTEMPTS).contains(&default_retry_attempts) {
            return Err(Error::Config(format!(
                "DEFAULT_RETRY_ATTEMPTS must be between {} and {}, got {}",
                MIN_RETRY_ATTEMPTS, MAX_RETRY_ATTEMPTS, default_retry_attempts
            )));
        }

        let job_retention = parse_optional::<u64>(&lookup, "JOB_RETENTION_SECS")?
            .map(Duration::from_secs);

        Ok(Self {
            gemini_api_key,
            gemini_base_url: lookup("GEMINI_BASE_URL").filter(|url| !url.is_empty()),
            model_name: lookup("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            max_prompt_length: parse_or(&lookup, "MAX_PROMPT_LENGTH", DEFAULT_MAX_PROMPT_LENGTH)?,
            max_image_bytes: parse_or(&lookup, "MAX_IMAGE_SIZE", DEFAULT_MAX_IMAGE_BYTES)?,
            max_dimension: parse_or(&lookup, "MAX_DIMENSION", DEFAULT_MAX_DIMENSION)?,
            default_quality: parse_or(&lookup, "DEFAULT_QUALITY", Quality::High)?,
            default_safety_level: parse_or(
                &lookup,
                "DEFAULT_SAFETY_LEVEL",
                SafetyLevel::BlockSome,
            )?,
            default_retry_attempts,
            min_call_interval: Duration::from_millis(parse_or(
                &lookup,
                "MIN_CALL_INTERVAL_MS",
                1000u64,
            )?),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8000u16)?,
            monthly_quota: parse_or(&lookup, "MONTHLY_QUOTA", 1000u64)?,
            job_retention,
        })
    }
}

fn parse_optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} has an invalid value '{}': {}", key, raw, e))),
        _ => Ok(None),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}
