//! Request lifecycle driver.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → state.rs (RequestState: id, head, reply)
//!     → onRequest → preParsing
//!     → BodyIngestor (bodied methods only)
//!     → preValidation → preHandler
//!     → Route handler → payload
//!     → onSend (may replace payload)
//!     → Response (+ x-request-id)
//!     → onResponse
//! ```
//!
//! Any failure before the response is built short-circuits to a JSON error
//! reply; the handler is not called.

pub mod dispatcher;
pub mod stages;
pub mod state;

pub use dispatcher::{Dispatcher, Route};
pub use stages::{LifecycleHooks, Stage};
pub use state::{Reply, RequestState, REQUEST_ID_HEADER};
