//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request core.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Body ingestion settings.
    pub body: BodyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// What the JSON parser does with prototype-poisoning keys.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoisonAction {
    /// Reject the body.
    #[default]
    Error,
    /// Strip the offending key.
    Remove,
    /// Keep the body as sent.
    Ignore,
}

/// Body ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BodyConfig {
    /// Server-wide body limit in bytes, used when neither the route nor the
    /// parser sets one.
    pub body_limit: usize,

    /// Capacity of the content-type → parser resolution cache.
    pub parser_cache_size: usize,

    /// Handling of `__proto__` keys in JSON bodies.
    pub on_proto_poisoning: PoisonAction,

    /// Handling of `constructor.prototype` in JSON bodies.
    pub on_constructor_poisoning: PoisonAction,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            body_limit: 1024 * 1024, // 1MiB
            parser_cache_size: 100,
            on_proto_poisoning: PoisonAction::Error,
            on_constructor_poisoning: PoisonAction::Error,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: CoreConfig = toml::from_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.body.body_limit, 1_048_576);
        assert_eq!(config.body.parser_cache_size, 100);
    }

    #[test]
    fn test_partial_override() {
        let config: CoreConfig = toml::from_str(
            r#"
            [body]
            body_limit = 4096
            on_proto_poisoning = "remove"

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.body.body_limit, 4096);
        assert_eq!(config.body.on_proto_poisoning, PoisonAction::Remove);
        assert_eq!(config.body.on_constructor_poisoning, PoisonAction::Error);
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.metrics_enabled);
    }
}
