//! Request-scoped state handed to every hook and to the route handler.

use axum::body::Bytes;
use axum::http::{header, request, Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::Serialize;
use uuid::Uuid;

use crate::body::ParsedBody;
use crate::hooks::HookError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Outgoing status and headers, filled in by hooks and the handler.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

impl Reply {
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn header(&mut self, name: header::HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `value` as the payload and mark the reply as JSON.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<Bytes, HookError> {
        let payload = serde_json::to_vec(value).map_err(HookError::from_error)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        Ok(Bytes::from(payload))
    }

    /// Use `text` as the payload and mark the reply as plain text.
    pub fn text(&mut self, text: impl Into<String>) -> Bytes {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Bytes::from(text.into())
    }
}

/// Everything known about one in-flight request.
///
/// Created by the dispatcher from the request head; the body stream is kept
/// aside until the parsing stage fills in `body`.
#[derive(Debug)]
pub struct RequestState {
    pub id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<ParsedBody>,
    /// Free-form slot for hooks to pass typed data downstream.
    pub extensions: Extensions,
    pub reply: Reply,
}

impl RequestState {
    pub fn from_parts(parts: request::Parts) -> Self {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: None,
            extensions: parts.extensions,
            reply: Reply::default(),
        }
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the request carries a body worth handing to a parser.
    ///
    /// Only POST, PUT, PATCH, DELETE and OPTIONS are read. A request with no
    /// content type, no transfer encoding and a zero or missing
    /// `Content-Length` is treated as bodiless.
    pub fn expects_body(&self) -> bool {
        let reads_body = matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE | Method::OPTIONS
        );
        if !reads_body {
            return false;
        }

        if self.headers.contains_key(header::CONTENT_TYPE)
            || self.headers.contains_key(header::TRANSFER_ENCODING)
        {
            return true;
        }

        !matches!(self.header(header::CONTENT_LENGTH), None | Some("0"))
    }
}
