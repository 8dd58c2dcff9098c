//! Content-type dispatched body ingestion.
//!
//! # Responsibilities
//! - Own the parser registry for one server context
//! - Memoize header → parser resolution in a bounded LRU cache
//! - Stream the body under the effective limit and run the parser
//!
//! # Design Decisions
//! - The cache is keyed by the exact header string and cleared on every
//!   registration change; dropping it only costs a rescan
//! - Registration takes `&mut self`, so it cannot overlap with requests
//!   served through a shared reference
//! - Cloning gives a child context: same parsers, empty cache

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::body::error::{BodyError, RegistrationError};
use crate::body::ingest::Ingestion;
use crate::body::parser::{JsonParser, ParsedBody, Parser, ParserOptions, RawBody};
use crate::body::registry::{ParserEntry, ParserRegistry};
use crate::body::stream::IncomingBody;
use crate::config::schema::BodyConfig;
use crate::observability::metrics::Metrics;

/// Parser registry, resolution cache and streaming limiter.
pub struct BodyIngestor {
    registry: ParserRegistry,
    cache: Mutex<LruCache<String, Arc<ParserEntry>>>,
    cache_capacity: NonZeroUsize,
    body_limit: usize,
    metrics: Metrics,
}

impl BodyIngestor {
    pub fn new(config: &BodyConfig) -> Self {
        let registry = ParserRegistry::with_defaults(JsonParser::from_config(config));
        Self::with_registry(registry, config)
    }

    /// Use a prepared registry instead of the defaults.
    pub fn with_registry(registry: ParserRegistry, config: &BodyConfig) -> Self {
        let cache_capacity = NonZeroUsize::new(config.parser_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            cache: Mutex::new(LruCache::new(cache_capacity)),
            cache_capacity,
            body_limit: config.body_limit,
            metrics: Metrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Server-wide default limit in bytes.
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn add_parser(
        &mut self,
        content_type: &str,
        options: ParserOptions,
        parser: impl Parser + 'static,
    ) -> Result<(), RegistrationError> {
        self.registry.add(content_type, options, Box::new(parser))?;
        self.clear_cache();
        Ok(())
    }

    pub fn has_parser(&self, content_type: &str) -> bool {
        self.registry.has(content_type)
    }

    pub fn get_parser(&self, content_type: &str) -> Option<Arc<ParserEntry>> {
        self.registry.get(content_type)
    }

    pub fn remove_parser(&mut self, content_type: &str) -> bool {
        let removed = self.registry.remove(content_type);
        if removed {
            self.clear_cache();
        }
        removed
    }

    pub fn remove_all_parsers(&mut self) {
        self.registry.clear();
        self.clear_cache();
    }

    fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Resolve the parser for a raw content-type header.
    pub fn resolve(&self, content_type: &str) -> Option<Arc<ParserEntry>> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_type)
        {
            return Some(Arc::clone(hit));
        }

        let entry = self.registry.lookup(content_type)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(content_type.to_string(), Arc::clone(&entry));
        Some(entry)
    }

    /// Read and parse a request body.
    ///
    /// `route_limit` overrides the parser's own limit, which overrides the
    /// server default.
    pub async fn ingest(
        &self,
        incoming: IncomingBody,
        route_limit: Option<usize>,
    ) -> Result<ParsedBody, BodyError> {
        let outcome = self.read_and_parse(incoming, route_limit).await;
        if let Err(error) = &outcome {
            self.metrics.record_body_rejected(error.code());
        }
        outcome
    }

    async fn read_and_parse(
        &self,
        incoming: IncomingBody,
        route_limit: Option<usize>,
    ) -> Result<ParsedBody, BodyError> {
        let content_type = incoming.content_type.clone().unwrap_or_default();
        let declared = incoming.declared_length();

        if incoming.malformed_content_type {
            tracing::warn!(content_type = %content_type, "Content type is not valid UTF-8");
            return Err(BodyError::UnsupportedMediaType { content_type });
        }

        let Some(entry) = self.resolve(&content_type) else {
            tracing::warn!(content_type = %content_type, "No parser for content type");
            return Err(BodyError::UnsupportedMediaType { content_type });
        };

        let options = *entry.options();
        let raw = match options.parse_as {
            Some(parse_as) => {
                let limit = route_limit
                    .or(options.body_limit)
                    .unwrap_or(self.body_limit);
                tracing::debug!(
                    content_type = %content_type,
                    parser = entry.key(),
                    declared = ?declared,
                    limit,
                    "Reading request body"
                );
                let mut ingestion =
                    Ingestion::start(parse_as, declared, limit, options.reject_empty, &content_type)?;
                let raw = ingestion.read(incoming.stream).await?;
                self.metrics.record_body_bytes(ingestion.received());
                raw
            }
            None => RawBody::Stream(incoming.stream),
        };

        entry.parser().parse(raw).resolve().await.map_err(|source| {
            tracing::debug!(content_type = %content_type, error = %source, "Parser rejected body");
            BodyError::Parse(source)
        })
    }

    /// Callback form of [`ingest`](Self::ingest); `done` runs exactly once.
    pub async fn ingest_with<F>(&self, incoming: IncomingBody, route_limit: Option<usize>, done: F)
    where
        F: FnOnce(Result<ParsedBody, BodyError>),
    {
        done(self.ingest(incoming, route_limit).await);
    }
}

impl Clone for BodyIngestor {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            cache: Mutex::new(LruCache::new(self.cache_capacity)),
            cache_capacity: self.cache_capacity,
            body_limit: self.body_limit,
            metrics: self.metrics,
        }
    }
}

impl Default for BodyIngestor {
    fn default() -> Self {
        Self::new(&BodyConfig::default())
    }
}

impl std::fmt::Debug for BodyIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyIngestor")
            .field("registry", &self.registry)
            .field("cache_capacity", &self.cache_capacity)
            .field("body_limit", &self.body_limit)
            .field("metrics", &self.metrics)
            .finish()
    }
}
