//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Resolve the log level from `RUST_LOG` or the configured default
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level
//! - Initialization is idempotent so tests and embedders can both call it

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Build the filter the subscriber will use.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_ascii_lowercase()))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(config: &ObservabilityConfig) -> bool {
    let installed = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(level = %config.log_level, "Logging initialized");
    }
    installed
}
