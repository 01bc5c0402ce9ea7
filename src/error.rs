//! Error types for the fetcher, the note store and the paste pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::url_validator::UrlValidationError;

/// Errors raised while fetching a page for link metadata.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Refusing to fetch: {0}")]
    Blocked(String),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed metadata response: {0}")]
    Decode(String),
}

impl From<UrlValidationError> for FetchError {
    fn from(err: UrlValidationError) -> Self {
        match err {
            UrlValidationError::InvalidUrl(msg) => FetchError::InvalidUrl(msg),
            UrlValidationError::UnsupportedScheme(_) => FetchError::InvalidUrl(err.to_string()),
            other => FetchError::Blocked(other.to_string()),
        }
    }
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Errors from the persistent note store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend failed: {0}")]
    Backend(#[from] sled::Error),

    #[error("Stored notes are corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to serialize notes: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from asynchronous clipboard work.
#[derive(Error, Debug)]
pub enum PasteError {
    #[error("Image decode task failed: {0}")]
    ImageDecode(String),
}
