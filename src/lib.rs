//! HTTP request lifecycle core: an ordered hook runner that accepts
//! synchronous, callback and future hooks, and a content-type dispatched
//! body ingestor with streaming size limits.

pub mod body;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod observability;

pub use body::{BodyError, BodyIngestor, ParsedBody, ParserOptions};
pub use config::schema::CoreConfig;
pub use dispatch::{Dispatcher, LifecycleHooks, RequestState, Route, Stage};
pub use error::Error;
pub use hooks::{Done, HookChain, HookError, PayloadHookChain};
