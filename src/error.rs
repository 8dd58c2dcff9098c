//! Crate-level error and its HTTP rendering.
//!
//! Every request-time failure ends up here before it is written back to the
//! client as `{ "statusCode", "code", "error", "message" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::body::BodyError;
use crate::hooks::HookError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Body(#[from] BodyError),

    /// The route handler itself failed.
    #[error("{0}")]
    Handler(#[source] HookError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Hook(e) | Error::Handler(e) => e.status(),
            Error::Body(e) => e.status(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Hook(e) => e.code(),
            Error::Body(e) => e.code(),
            Error::Handler(_) => "HANDLER_FAILED",
        }
    }

    /// JSON body sent to the client.
    pub fn to_body(&self) -> ErrorBody {
        let status = self.status();
        ErrorBody {
            status_code: status.as_u16(),
            code: self.code(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: self.to_string(),
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub code: &'static str,
    pub error: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}
