use super::error::{ApiError, ApiResult};
use super::response::{ApiResponse, ResponseMetadata};
use super::{AppState, API_VERSION};
use crate::app::{ColorizeOptions, HealthReport, UsageReport};
use crate::batch::{BatchJob, JobStatus, DEFAULT_CONCURRENCY};
use crate::image::ColorClass;
use crate::models::UploadedImage;
use crate::spelling::SpellingIssue;
use crate::Error;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub file_size: usize,
    pub color_mode: String,
}

#[derive(Debug, Serialize)]
pub struct ColorizeData {
    /// Hex-encoded result image.
    pub image_data: String,
    pub generation_id: String,
    pub processing_time: f64,
    pub attempts: u32,
    pub image_info: ImageInfo,
    pub style_prompt_used: String,
    pub spelling_issues: Vec<SpellingIssue>,
}

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub job_id: String,
    pub status: JobStatus,
    pub total_images: usize,
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "NANozILLA Reactor API",
        "status": "operational",
        "version": API_VERSION,
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.app.health())
}

/// POST /api/v1/colorize
pub async fn colorize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<ColorizeData>>> {
    let mut options = state.app.default_options();
    let mut upload: Option<UploadedImage> = None;
    let mut prompt = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => upload = Some(read_upload(field).await?),
            "style_prompt" => prompt = read_text(field).await?,
            "quality" => options.quality = read_text(field).await?.parse()?,
            "safety_level" => options.safety_level = read_text(field).await?.parse()?,
            "output_format" => options.output_format = read_text(field).await?.parse()?,
            "retry_attempts" => options.retry_attempts = parse_number(&name, &read_text(field).await?)?,
            _ => tracing::debug!("Ignoring unknown multipart field '{}'", name),
        }
    }

    let upload = upload.ok_or_else(|| Error::Validation("No file uploaded".to_string()))?;
    let outcome = state.app.colorize(upload, &prompt, options).await?;

    let color_mode = match outcome.source.color_analysis {
        Some(analysis) => match analysis.color_mode {
            ColorClass::Grayscale => "Grayscale".to_string(),
            ColorClass::Color => "Color".to_string(),
        },
        None => outcome.source.color_mode.as_str().to_string(),
    };

    let data = ColorizeData {
        image_info: ImageInfo {
            format: outcome.format.as_str().to_string(),
            width: outcome.source.width,
            height: outcome.source.height,
            file_size: outcome.image.len(),
            color_mode,
        },
        image_data: hex::encode(&outcome.image),
        generation_id: outcome.generation_id,
        processing_time: outcome.processing_time.as_secs_f64(),
        attempts: outcome.attempts,
        style_prompt_used: outcome.prompt_used,
        spelling_issues: outcome.spelling_issues,
    };

    Ok(Json(ApiResponse::with_metadata(
        data,
        ResponseMetadata::now().with_model(outcome.model),
    )))
}

/// POST /api/v1/colorize/batch
pub async fn colorize_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<BatchAccepted>>)> {
    let mut items = Vec::new();
    let mut prompt = String::new();
    let mut concurrency = DEFAULT_CONCURRENCY;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" | "images[]" => items.push(read_upload(field).await?),
            "style_prompt" => prompt = read_text(field).await?,
            "concurrency" | "concurrent" => {
                concurrency = parse_number(&name, &read_text(field).await?)?
            }
            _ => tracing::debug!("Ignoring unknown multipart field '{}'", name),
        }
    }

    let job: BatchJob = state.app.submit_batch(items, &prompt, concurrency)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(BatchAccepted {
            job_id: job.job_id,
            status: job.status,
            total_images: job.total_images,
        })),
    ))
}

/// GET /api/v1/jobs/{job_id}
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ApiResponse<BatchJob>>> {
    let job = state.app.job_status(&job_id)?;
    Ok(Json(ApiResponse::new(job)))
}

/// GET /api/v1/analytics/usage
pub async fn usage(State(state): State<AppState>) -> Json<ApiResponse<UsageReport>> {
    Json(ApiResponse::with_metadata(
        state.app.usage(),
        ResponseMetadata::now().with_model(state.app.model()),
    ))
}

async fn read_upload(field: axum::extract::multipart::Field<'_>) -> ApiResult<UploadedImage> {
    let filename = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(UploadedImage::new(bytes.to_vec(), filename, content_type))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> ApiResult<T> {
    raw.trim().parse().map_err(|_| {
        ApiError::Domain(Error::Validation(format!(
            "Field '{}' must be a whole number, got '{}'",
            name, raw
        )))
    })
}
