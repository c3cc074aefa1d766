//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Bad caller input rejected before any processing.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input rejected by the generation client before any remote call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The remote call succeeded at the transport level but the payload is unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    /// A remote failure that retrying cannot fix (auth, quota, policy, missing model).
    #[error("Fatal remote service error: {0}")]
    FatalRemoteService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// Errors caused by the caller's input rather than by this service or the remote model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InvalidInput(_)
                | Error::Decode(_)
                | Error::UnsupportedFormat(_)
        )
    }

    /// Errors that originate from the remote generation service.
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            Error::RemoteService(_) | Error::FatalRemoteService(_) | Error::InvalidResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
