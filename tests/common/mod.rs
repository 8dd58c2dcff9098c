//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use futures_util::stream;
use request_lifecycle::body::BodyStream;
use request_lifecycle::{Dispatcher, Route};
use tower::ServiceExt;

/// A body stream that yields the given chunks in order.
#[allow(dead_code)]
pub fn chunked(chunks: &[&'static str]) -> BodyStream {
    let chunks: Vec<_> = chunks
        .iter()
        .map(|chunk| Ok::<_, std::io::Error>(Bytes::from_static(chunk.as_bytes())))
        .collect();
    BodyStream::new(stream::iter(chunks))
}

/// An endless stream of `chunk_size`-byte chunks that counts every byte the
/// consumer pulled out of it.
#[allow(dead_code)]
pub fn endless_counting(chunk_size: usize) -> (BodyStream, Arc<AtomicUsize>) {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let body = stream::repeat_with(move || {
        counter.fetch_add(chunk_size, Ordering::SeqCst);
        Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; chunk_size]))
    });
    (BodyStream::new(body), pulled)
}

/// A route that counts its calls and echoes the parsed JSON body back.
#[allow(dead_code)]
pub fn echo_json_route(calls: Arc<AtomicUsize>) -> Route {
    Route::new(move |state| {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let body = state
                .body
                .as_ref()
                .and_then(|b| b.as_json())
                .cloned()
                .unwrap_or_default();
            state.reply.json(&body)
        })
    })
}

/// Mount `route` at `/` behind `dispatcher`.
pub fn app(dispatcher: Dispatcher, route: Route) -> Router {
    let dispatcher = Arc::new(dispatcher);
    Router::new().route("/", dispatcher.endpoint(route))
}

/// Send a request through the router and collect the reply.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Like [`send`], decoding the reply as JSON.
#[allow(dead_code)]
pub async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}
