//! Success envelope shared by every `/api/v1` handler.

use super::API_VERSION;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ResponseMetadata {
    pub fn now() -> Self {
        Self {
            version: API_VERSION,
            timestamp: Utc::now(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// `{ "success": true, "data": ..., "metadata": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: ResponseMetadata,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            metadata: ResponseMetadata::now(),
        }
    }

    pub fn with_metadata(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data,
            metadata,
        }
    }
}
