use super::response::ResponseMetadata;
use crate::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Handler error; renders the `{success: false, error: {code, message}}`
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] Error),

    /// Malformed request that never reached the pipeline.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// User-facing category of a remote model failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    Authentication,
    ContentPolicy,
    QuotaExceeded,
    ModelNotFound,
    InvalidRequest,
    ServiceUnavailable,
}

/// Checked in order; the first category with a matching marker wins.
const REMOTE_FAILURE_MARKERS: [(RemoteFailure, &[&str]); 6] = [
    (
        RemoteFailure::Authentication,
        &[
            "invalid api key",
            "api key not valid",
            "authentication failed",
            "permission denied",
            "permission_denied",
            "status 401",
            "status 403",
        ],
    ),
    (
        RemoteFailure::ContentPolicy,
        &["content policy violation"],
    ),
    (
        RemoteFailure::QuotaExceeded,
        &["quota exceeded", "resource_exhausted", "resource exhausted", "status 429"],
    ),
    (
        RemoteFailure::ModelNotFound,
        &["model not found", "not_found", "status 404"],
    ),
    (
        RemoteFailure::InvalidRequest,
        &["invalid_argument", "invalid argument", "status 400"],
    ),
    (
        RemoteFailure::ServiceUnavailable,
        &[
            "unavailable",
            "internal",
            "status 500",
            "status 502",
            "status 503",
            "status 504",
        ],
    ),
];

impl RemoteFailure {
    /// Categorize a remote error message by marker text and HTTP status.
    pub fn from_message(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        REMOTE_FAILURE_MARKERS
            .iter()
            .find(|(_, markers)| markers.iter().any(|marker| lowered.contains(marker)))
            .map(|(category, _)| *category)
    }

    pub fn code(&self) -> &'static str {
        match self {
            RemoteFailure::Authentication => "AUTHENTICATION_ERROR",
            RemoteFailure::ContentPolicy => "CONTENT_POLICY",
            RemoteFailure::QuotaExceeded => "QUOTA_EXCEEDED",
            RemoteFailure::ModelNotFound => "MODEL_NOT_FOUND",
            RemoteFailure::InvalidRequest => "INVALID_REQUEST",
            RemoteFailure::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RemoteFailure::Authentication => {
                "Authentication error: check the configured API key"
            }
            RemoteFailure::ContentPolicy => {
                "The request was blocked by the model's content policy"
            }
            RemoteFailure::QuotaExceeded => {
                "Quota exceeded: the usage limit was reached, try again later"
            }
            RemoteFailure::ModelNotFound => "Model not found: the requested model is unavailable",
            RemoteFailure::InvalidRequest => {
                "Invalid request: check the style prompt or uploaded image"
            }
            RemoteFailure::ServiceUnavailable => {
                "Service temporarily unavailable: try again in a few moments"
            }
        }
    }
}

impl ApiError {
    /// Category of a remote failure, if this error came from the model.
    pub fn remote_failure(&self) -> Option<RemoteFailure> {
        match self {
            ApiError::Domain(Error::RemoteService(message))
            | ApiError::Domain(Error::FatalRemoteService(message)) => {
                RemoteFailure::from_message(message)
            }
            _ => None,
        }
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        if let Some(category) = self.remote_failure() {
            return (StatusCode::BAD_GATEWAY, category.code());
        }

        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Domain(err) => match err {
                Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                Error::Decode(_) => (StatusCode::BAD_REQUEST, "DECODE_ERROR"),
                Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
                Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                Error::FatalRemoteService(_) => (StatusCode::BAD_GATEWAY, "REMOTE_SERVICE_FATAL"),
                Error::RemoteService(_) => (StatusCode::BAD_GATEWAY, "REMOTE_SERVICE_ERROR"),
                Error::InvalidResponse(_) => (StatusCode::BAD_GATEWAY, "INVALID_RESPONSE"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match (&self, self.remote_failure()) {
            (ApiError::BadRequest(msg), _) => msg.clone(),
            (ApiError::Domain(err), Some(category)) => {
                tracing::error!(error = %err, "Upstream error");
                category.message().to_string()
            }
            (ApiError::Domain(err), None) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %err, "Internal error");
                "An internal server error occurred".to_string()
            }
            (ApiError::Domain(err), None) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "Upstream error");
                }
                err.to_string()
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            },
            "metadata": ResponseMetadata::now(),
        });

        (status, axum::Json(body)).into_response()
    }
}
