//! Parser functions and the built-in JSON / text parsers.
//!
//! # Responsibilities
//! - Define the parser contract (materialized or raw-stream input)
//! - Accept sync and future-returning parsers behind one trait
//! - Provide the default `application/json` and `text/plain` parsers
//!
//! # Design Decisions
//! - Parse failures are plain boxed errors; ingestion maps them to 400
//! - JSON is checked for prototype-poisoning keys after parsing

use std::future::Future;

use axum::body::Bytes;
use axum::BoxError;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::body::stream::BodyStream;
use crate::config::schema::{BodyConfig, PoisonAction};

/// How a parser wants the body delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAs {
    /// Fully buffered and decoded as UTF-8.
    String,
    /// Fully buffered bytes.
    Buffer,
}

/// Registration options for a parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// `None` hands the raw stream to the parser.
    pub parse_as: Option<ParseAs>,
    /// Per-parser limit, used when the route sets none.
    pub body_limit: Option<usize>,
    /// Fail zero-byte bodies instead of parsing them.
    pub reject_empty: bool,
}

impl ParserOptions {
    pub fn string() -> Self {
        Self {
            parse_as: Some(ParseAs::String),
            ..Self::default()
        }
    }

    pub fn buffer() -> Self {
        Self {
            parse_as: Some(ParseAs::Buffer),
            ..Self::default()
        }
    }

    pub fn stream() -> Self {
        Self::default()
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn rejecting_empty(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    /// Whether ingestion must buffer the body before calling the parser.
    pub fn materializes(&self) -> bool {
        self.parse_as.is_some()
    }
}

/// Body handed to a parser.
#[derive(Debug)]
pub enum RawBody {
    Text(String),
    Buffer(Bytes),
    Stream(BodyStream),
}

/// Value produced by a parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl ParsedBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParsedBody::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Result of calling a parser: immediate, or a future to await.
pub enum Parsing {
    Ready(Result<ParsedBody, BoxError>),
    Pending(BoxFuture<'static, Result<ParsedBody, BoxError>>),
}

impl Parsing {
    pub(crate) async fn resolve(self) -> Result<ParsedBody, BoxError> {
        match self {
            Parsing::Ready(result) => result,
            Parsing::Pending(future) => future.await,
        }
    }
}

/// Turns a request body into a [`ParsedBody`].
pub trait Parser: Send + Sync {
    fn parse(&self, body: RawBody) -> Parsing;
}

struct FnParser<F>(F);

impl<F> Parser for FnParser<F>
where
    F: Fn(RawBody) -> Result<ParsedBody, BoxError> + Send + Sync,
{
    fn parse(&self, body: RawBody) -> Parsing {
        Parsing::Ready((self.0)(body))
    }
}

struct AsyncFnParser<F>(F);

impl<F, Fut> Parser for AsyncFnParser<F>
where
    F: Fn(RawBody) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ParsedBody, BoxError>> + Send + 'static,
{
    fn parse(&self, body: RawBody) -> Parsing {
        Parsing::Pending(Box::pin((self.0)(body)))
    }
}

/// Wrap a synchronous parse function.
pub fn from_fn<F>(f: F) -> impl Parser
where
    F: Fn(RawBody) -> Result<ParsedBody, BoxError> + Send + Sync + 'static,
{
    FnParser(f)
}

/// Wrap a parse function returning a future.
pub fn from_async_fn<F, Fut>(f: F) -> impl Parser
where
    F: Fn(RawBody) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ParsedBody, BoxError>> + Send + 'static,
{
    AsyncFnParser(f)
}

/// Default `application/json` parser.
#[derive(Debug, Clone, Copy)]
pub struct JsonParser {
    on_proto: PoisonAction,
    on_constructor: PoisonAction,
}

#[derive(Debug, thiserror::Error)]
#[error("Object contains forbidden prototype property")]
struct PoisonedJson;

impl JsonParser {
    pub fn new(on_proto: PoisonAction, on_constructor: PoisonAction) -> Self {
        Self {
            on_proto,
            on_constructor,
        }
    }

    pub fn from_config(config: &BodyConfig) -> Self {
        Self::new(config.on_proto_poisoning, config.on_constructor_poisoning)
    }

    pub fn options() -> ParserOptions {
        ParserOptions::string().rejecting_empty()
    }

    fn parse_text(&self, text: &str) -> Result<Value, BoxError> {
        let mut value: Value = serde_json::from_str(text)?;
        self.scrub(&mut value)?;
        Ok(value)
    }

    fn scrub(&self, value: &mut Value) -> Result<(), PoisonedJson> {
        match value {
            Value::Object(map) => {
                if map.contains_key("__proto__") {
                    match self.on_proto {
                        PoisonAction::Error => return Err(PoisonedJson),
                        PoisonAction::Remove => {
                            map.remove("__proto__");
                        }
                        PoisonAction::Ignore => {}
                    }
                }

                let poisoned_constructor = matches!(
                    map.get("constructor"),
                    Some(Value::Object(ctor)) if ctor.contains_key("prototype")
                );
                if poisoned_constructor {
                    match self.on_constructor {
                        PoisonAction::Error => return Err(PoisonedJson),
                        PoisonAction::Remove => {
                            map.remove("constructor");
                        }
                        PoisonAction::Ignore => {}
                    }
                }

                for child in map.values_mut() {
                    self.scrub(child)?;
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.scrub(child)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new(PoisonAction::Error, PoisonAction::Error)
    }
}

impl Parser for JsonParser {
    fn parse(&self, body: RawBody) -> Parsing {
        let result = match body {
            RawBody::Text(text) => self.parse_text(&text),
            RawBody::Buffer(bytes) => std::str::from_utf8(&bytes)
                .map_err(BoxError::from)
                .and_then(|text| self.parse_text(text)),
            RawBody::Stream(_) => Err("JSON parser requires a materialized body".into()),
        };
        Parsing::Ready(result.map(ParsedBody::Json))
    }
}

/// Default `text/plain` parser: hands the decoded string through.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl TextParser {
    pub fn options() -> ParserOptions {
        ParserOptions::string()
    }
}

impl Parser for TextParser {
    fn parse(&self, body: RawBody) -> Parsing {
        let result = match body {
            RawBody::Text(text) => Ok(ParsedBody::Text(text)),
            RawBody::Buffer(bytes) => Ok(ParsedBody::Text(String::from_utf8_lossy(&bytes).into_owned())),
            RawBody::Stream(_) => Err("text parser requires a materialized body".into()),
        };
        Parsing::Ready(result)
    }
}
