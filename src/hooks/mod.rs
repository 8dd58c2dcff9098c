//! Lifecycle hook execution.
//!
//! # Data Flow
//! ```text
//! dispatcher
//!     → chain.rs   (HookChain: onRequest / preParsing / preValidation / preHandler)
//!     → payload.rs (PayloadHookChain: onSend, threads the reply payload)
//!     → invoke.rs  (per-hook adapter: return / callback / future → one outcome)
//! ```
//!
//! # Design Decisions
//! - Strictly sequential: hook i+1 starts after hook i completes
//! - First failure wins and ends the run; completion is reported once
//! - Panics are not caught; they unwind through the runner untouched

pub mod chain;
pub mod error;
pub mod invoke;
pub mod payload;

pub use chain::{Hook, HookChain};
pub use error::HookError;
pub use invoke::{Done, HookOutcome, Invocation};
pub use payload::{Interrupted, PayloadHook, PayloadHookChain};
