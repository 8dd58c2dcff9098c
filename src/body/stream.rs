//! Raw request body as a byte stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use axum::BoxError;
use futures_util::{Stream, StreamExt};

/// Boxed stream of body chunks.
///
/// Dropping it releases the underlying connection body; nothing is read
/// past that point.
pub struct BodyStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>,
}

impl BodyStream {
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            inner: Box::pin(stream.map(|chunk| chunk.map_err(Into::into))),
        }
    }

    pub fn empty() -> Self {
        Self::new(futures_util::stream::empty::<Result<Bytes, BoxError>>())
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl From<Body> for BodyStream {
    fn from(body: Body) -> Self {
        Self::new(body.into_data_stream())
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream").finish_non_exhaustive()
    }
}

/// Everything ingestion needs from one request: the two headers and the body.
#[derive(Debug)]
pub struct IncomingBody {
    pub content_type: Option<String>,
    /// The `content-type` header was not valid UTF-8; `content_type` holds
    /// its lossy text.
    pub malformed_content_type: bool,
    /// Raw `Content-Length` value; non-numeric values count as unknown.
    pub content_length: Option<String>,
    pub stream: BodyStream,
}

impl IncomingBody {
    pub fn new(content_type: Option<&str>, content_length: Option<&str>, stream: BodyStream) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            malformed_content_type: false,
            content_length: content_length.map(str::to_string),
            stream,
        }
    }

    /// Pull `content-type` and `content-length` out of request headers.
    pub fn from_parts(headers: &HeaderMap, body: impl Into<BodyStream>) -> Self {
        let content_type = headers.get(header::CONTENT_TYPE);
        let malformed_content_type = content_type.is_some_and(|v| v.to_str().is_err());

        Self {
            content_type: content_type.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
            malformed_content_type,
            content_length: headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            stream: body.into(),
        }
    }

    /// Declared length, if present and numeric.
    pub fn declared_length(&self) -> Option<usize> {
        self.content_length
            .as_deref()
            .and_then(|v| v.trim().parse::<usize>().ok())
    }
}
