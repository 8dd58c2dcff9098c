//! Hook failure type.

use axum::http::StatusCode;
use axum::BoxError;
use thiserror::Error;

/// Errors that stop a hook chain.
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook reported failure: returned `Err`, passed an error to its
    /// completion callback, or its future resolved to `Err`.
    #[error("{message}")]
    Failed {
        /// Status the dispatcher should answer with.
        status: StatusCode,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A callback-style hook kept its completion handle past the call and
    /// then dropped every copy of it without completing.
    #[error("hook #{index} dropped its completion callback without invoking it")]
    CallbackDropped { index: usize },
}

impl HookError {
    /// Create a failure answered with 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Create a failure answered with the given status.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        HookError::Failed {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error raised inside a hook.
    pub fn from_error(error: impl Into<BoxError>) -> Self {
        let source = error.into();
        HookError::Failed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn callback_dropped(index: usize) -> Self {
        HookError::CallbackDropped { index }
    }

    /// HTTP status associated with this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            HookError::Failed { status, .. } => *status,
            HookError::CallbackDropped { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            HookError::Failed { .. } => "HOOK_FAILED",
            HookError::CallbackDropped { .. } => "HOOK_CALLBACK_DROPPED",
        }
    }
}
