//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! hooks / body / dispatch produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every log event emitted during dispatch
//! - Metrics are cheap (atomic increments) and a no-op without a recorder
//! - No exporter is bundled; the embedding server owns exposition

pub mod logging;
pub mod metrics;
