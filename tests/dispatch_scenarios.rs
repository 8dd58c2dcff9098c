//! End-to-end lifecycle tests through an axum router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use request_lifecycle::body::parser::{from_async_fn, from_fn};
use request_lifecycle::body::{ParsedBody, ParserOptions};
use request_lifecycle::config::parse_config;
use request_lifecycle::{Dispatcher, HookError, Route};
use serde_json::json;

mod common;

fn post(content_type: &str, body: &'static str) -> Request<Body> {
    Request::post("/")
        .header("content-type", content_type)
        .header("content-length", body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_json_body_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(Dispatcher::default(), common::echo_json_route(calls.clone()));

    let (status, body) = common::send_json(app, post("application/json", r#"{"a":1}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 1}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_json_body_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(Dispatcher::default(), common::echo_json_route(calls.clone()));

    let (status, body) = common::send_json(app, post("application/json", "")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["code"], "EMPTY_BODY");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_media_type() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(Dispatcher::default(), common::echo_json_route(calls.clone()));

    let (status, body) = common::send_json(app, post("application/unknown", "??")).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(body["message"], "Unsupported Media Type: application/unknown");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_declared_length_over_route_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let route = common::echo_json_route(calls.clone()).with_body_limit(10);
    let app = common::app(Dispatcher::default(), route);

    let payload: &'static str = r#"{"padding":"0123456789012345678901234567890123"}"#;
    let (status, body) = common::send_json(app, post("application/json", payload)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "BODY_TOO_LARGE");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(Dispatcher::default(), common::echo_json_route(calls.clone()));

    let (status, body) = common::send_json(app, post("application/json", "{nope")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_BODY");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

async fn reject_after_yield(
    _body: request_lifecycle::body::RawBody,
) -> Result<ParsedBody, axum::BoxError> {
    tokio::task::yield_now().await;
    Err("checksum mismatch".into())
}

#[tokio::test]
async fn test_async_parser_rejection_skips_handler() {
    let mut dispatcher = Dispatcher::default();
    dispatcher
        .ingestor_mut()
        .add_parser(
            "application/x-checked",
            ParserOptions::string(),
            from_async_fn(reject_after_yield),
        )
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(dispatcher, common::echo_json_route(calls.clone()));
    let (status, body) = common::send_json(app, post("application/x-checked", "data")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_BODY");
    assert_eq!(body["message"], "Failed to parse request body: checksum mismatch");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_proto_poisoning_per_config() {
    let payload = r#"{"a":1,"__proto__":{"admin":true}}"#;

    let calls = Arc::new(AtomicUsize::new(0));
    let strict = common::app(Dispatcher::default(), common::echo_json_route(calls.clone()));
    let (status, _) = common::send_json(strict, post("application/json", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let config = parse_config("[body]\non_proto_poisoning = \"remove\"\n").unwrap();
    let lenient = common::app(
        Dispatcher::from_config(&config),
        common::echo_json_route(calls.clone()),
    );
    let (status, body) = common::send_json(lenient, post("application/json", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 1}));
}

#[tokio::test]
async fn test_missing_content_type_uses_wildcard() {
    let mut dispatcher = Dispatcher::default();
    dispatcher
        .ingestor_mut()
        .add_parser(
            "*",
            ParserOptions::buffer(),
            from_fn(|raw| match raw {
                request_lifecycle::body::RawBody::Buffer(bytes) => Ok(ParsedBody::Bytes(bytes)),
                _ => Err("expected a buffer".into()),
            }),
        )
        .unwrap();

    let route = Route::new(|state| {
        Box::pin(async move {
            match state.body.take() {
                Some(ParsedBody::Bytes(bytes)) => Ok(bytes),
                other => Err(HookError::new(format!("unexpected body {other:?}"))),
            }
        })
    });
    let request = Request::post("/")
        .header("content-length", "5")
        .body(Body::from("hello"))
        .unwrap();

    let (status, _, body) = common::send(common::app(dispatcher, route), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn test_non_utf8_content_type_skips_wildcard() {
    let mut dispatcher = Dispatcher::default();
    dispatcher
        .ingestor_mut()
        .add_parser("*", ParserOptions::buffer(), from_fn(|_| Ok(ParsedBody::Bytes(Bytes::new()))))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let request = Request::post("/")
        .header(
            "content-type",
            axum::http::HeaderValue::from_bytes(b"text/pl\xe9ain").unwrap(),
        )
        .header("content-length", "2")
        .body(Body::from("hi"))
        .unwrap();

    let app = common::app(dispatcher, common::echo_json_route(calls.clone()));
    let (status, body) = common::send_json(app, request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(body["message"], "Unsupported Media Type: text/pl\u{fffd}ain");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_body_is_not_parsed() {
    let route = Route::new(|state| {
        Box::pin(async move {
            let seen = state.body.is_some();
            Ok(state.reply.text(seen.to_string()))
        })
    });
    let request = Request::get("/")
        .header("content-type", "application/json")
        .body(Body::from("{broken"))
        .unwrap();

    let (status, _, body) = common::send(common::app(Dispatcher::default(), route), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"false");
}

#[tokio::test]
async fn test_mixed_hook_conventions_in_order() {
    let mut dispatcher = Dispatcher::default();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    dispatcher.hooks_mut().on_request.add_sync(move |_| {
        o.lock().unwrap().push("sync");
        Ok(())
    });
    let o = Arc::clone(&order);
    dispatcher.hooks_mut().on_request.add_callback(move |_, done| {
        let o = Arc::clone(&o);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            o.lock().unwrap().push("callback");
            done.ok();
        });
    });
    let o = Arc::clone(&order);
    dispatcher.hooks_mut().pre_handler.add_async(move |state| {
        let o = Arc::clone(&o);
        Box::pin(async move {
            tokio::task::yield_now().await;
            o.lock().unwrap().push("async");
            state.reply.status = StatusCode::ACCEPTED;
            Ok(())
        })
    });

    let route = Route::new(|_| Box::pin(async { Ok(Bytes::new()) }));
    let (status, _, _) = common::send(
        common::app(dispatcher, route),
        Request::get("/").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(*order.lock().unwrap(), vec!["sync", "callback", "async"]);
}

#[tokio::test]
async fn test_callback_failure_carries_status() {
    let mut dispatcher = Dispatcher::default();
    dispatcher.hooks_mut().on_request.add_callback(|state, done| {
        if state.headers.contains_key("authorization") {
            done.ok();
        } else {
            done.fail(HookError::with_status(StatusCode::UNAUTHORIZED, "missing credentials"));
        }
    });

    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(dispatcher, common::echo_json_route(calls.clone()));
    let request = Request::get("/")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = common::send(app, request).await;
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "missing credentials");
    assert_eq!(headers["x-request-id"], "trace-me");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_on_send_rewrites_payload() {
    let mut dispatcher = Dispatcher::default();
    dispatcher
        .hooks_mut()
        .on_send
        .add_sync(|_, payload: &Bytes| Ok(Some(Bytes::from(payload.to_ascii_uppercase()))));
    dispatcher.hooks_mut().on_send.add_sync(|_, _| Ok(None));

    let route = Route::new(|state| Box::pin(async move { Ok(state.reply.text("quiet")) }));
    let (_, headers, body) = common::send(
        common::app(dispatcher, route),
        Request::get("/").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(&body[..], b"QUIET");
    assert_eq!(headers["content-type"], "text/plain; charset=utf-8");
}
