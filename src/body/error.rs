//! Body ingestion and parser registration errors.

use axum::http::StatusCode;
use axum::BoxError;
use thiserror::Error;

/// Request-time failures while reading or parsing a body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// No registered parser matches the request's content type.
    #[error("Unsupported Media Type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    /// Declared or received length exceeds the effective limit.
    #[error("Request body is too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The stream ended with a different byte count than `Content-Length` declared.
    #[error("Request body size did not match Content-Length: expected {declared}, received {received}")]
    LengthMismatch { declared: usize, received: usize },

    /// Zero bytes arrived for a parser that requires a body.
    #[error("Body cannot be empty when content-type is set to '{content_type}'")]
    EmptyBody { content_type: String },

    /// The underlying stream failed or was destroyed mid-read.
    #[error("Failed to read request body: {0}")]
    Stream(#[source] BoxError),

    /// The parser rejected the materialized body.
    #[error("Failed to parse request body: {0}")]
    Parse(#[source] BoxError),
}

impl BodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BodyError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::LengthMismatch { .. }
            | BodyError::EmptyBody { .. }
            | BodyError::Stream(_)
            | BodyError::Parse(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BodyError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            BodyError::TooLarge { .. } => "BODY_TOO_LARGE",
            BodyError::LengthMismatch { .. } => "INVALID_CONTENT_LENGTH",
            BodyError::EmptyBody { .. } => "EMPTY_BODY",
            BodyError::Stream(_) => "BODY_STREAM_ERROR",
            BodyError::Parse(_) => "INVALID_BODY",
        }
    }
}

/// Setup-time failures from parser registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("The content type cannot be an empty string")]
    EmptyType,

    #[error("Invalid content type: {0:?}")]
    InvalidType(String),

    #[error("Content type parser '{0}' already present")]
    AlreadyPresent(String),

    #[error("The body limit option must be greater than zero")]
    InvalidBodyLimit,
}
