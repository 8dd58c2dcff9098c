//! Metrics collection.
//!
//! # Metrics
//! - `body_rejected_total` (counter): rejected bodies by error code
//! - `body_bytes_received_total` (counter): bytes accepted from request bodies
//! - `hook_failures_total` (counter): hook chain failures by lifecycle stage
//! - `requests_total` (counter): dispatched requests by response status
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording goes through the `metrics` facade; no recorder means no cost
//! - The on/off switch travels with each dispatcher and ingestor, so two
//!   server contexts in one process keep their own setting

use crate::config::schema::ObservabilityConfig;

/// Per-context metrics handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    enabled: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self::new(config.metrics_enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_body_rejected(&self, code: &'static str) {
        if self.enabled {
            ::metrics::counter!("body_rejected_total", "code" => code).increment(1);
        }
    }

    pub fn record_body_bytes(&self, bytes: usize) {
        if self.enabled {
            ::metrics::counter!("body_bytes_received_total").increment(bytes as u64);
        }
    }

    pub fn record_hook_failure(&self, stage: &'static str) {
        if self.enabled {
            ::metrics::counter!("hook_failures_total", "stage" => stage).increment(1);
        }
    }

    pub fn record_request(&self, status: u16) {
        if self.enabled {
            ::metrics::counter!("requests_total", "status" => status.to_string()).increment(1);
        }
    }
}
