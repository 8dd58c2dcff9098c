//! Request body ingestion.
//!
//! # Data Flow
//! ```text
//! content-type header
//!     → ingestor.rs (LRU cache → registry.rs lookup)
//!     → parser wants a materialized body?
//!         yes: ingest.rs (length check, bounded streaming) → parser.rs
//!         no:  raw BodyStream → parser.rs
//!     → ParsedBody | BodyError
//! ```
//!
//! # Design Decisions
//! - One `BodyIngestor` per server context, never a process-wide registry
//! - Limits are enforced while streaming, not after full receipt
//! - Registration errors surface at setup; request errors carry HTTP status

pub mod error;
pub mod ingest;
pub mod ingestor;
pub mod parser;
pub mod registry;
pub mod stream;

pub use error::{BodyError, RegistrationError};
pub use ingestor::BodyIngestor;
pub use parser::{ParseAs, ParsedBody, Parser, ParserOptions, Parsing, RawBody};
pub use registry::{ParserEntry, ParserRegistry};
pub use stream::{BodyStream, IncomingBody};
