//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → BodyIngestor / Dispatcher built from it at setup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require building a new dispatcher
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BodyConfig, CoreConfig, ObservabilityConfig, PoisonAction};
pub use validation::ValidationError;
