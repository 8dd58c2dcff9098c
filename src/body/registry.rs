//! Content-type → parser registrations.
//!
//! # Responsibilities
//! - Validate and store parser registrations
//! - Keep the scan order used by resolution
//! - Match a content-type header against the registered keys
//!
//! # Design Decisions
//! - Keys are trimmed and lower-cased; `*` is stored as the empty key
//! - Newly added keys go to the front of the scan list, ahead of the built-ins.
//!   Replacing `text/plain` moves it to the front too; a replaced
//!   `application/json` keeps its slot
//! - The wildcard never sits in the scan list; it is only the last resort
//! - Matching is substring containment on the lower-cased header, so
//!   `application/json` also matches `application/json; charset=utf-8`.
//!   This is loose on purpose: a key like `json` matches any header containing it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::body::error::RegistrationError;
use crate::body::parser::{JsonParser, Parser, ParserOptions, TextParser};

pub const JSON: &str = "application/json";
pub const TEXT: &str = "text/plain";
const WILDCARD: &str = "";

/// A registered parser and its options.
pub struct ParserEntry {
    key: String,
    options: ParserOptions,
    builtin: bool,
    parser: Box<dyn Parser>,
}

impl ParserEntry {
    /// Registered key (`""` for the wildcard).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// True for a default parser that has not been replaced.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }
}

impl std::fmt::Debug for ParserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("builtin", &self.builtin)
            .finish_non_exhaustive()
    }
}

/// Registered parsers for one server context.
#[derive(Clone, Debug)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<ParserEntry>>,
    /// Scan order for substring matching, excluding the wildcard.
    order: Vec<String>,
    /// Built-in keys that may still be replaced once.
    replaceable: HashSet<String>,
}

impl ParserRegistry {
    /// Registry holding only the built-in JSON and text parsers.
    pub fn with_defaults(json: JsonParser) -> Self {
        let mut registry = Self::empty();
        registry.insert_builtin(JSON, JsonParser::options(), Box::new(json));
        registry.insert_builtin(TEXT, TextParser::options(), Box::new(TextParser));
        registry
    }

    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
            order: Vec::new(),
            replaceable: HashSet::new(),
        }
    }

    fn insert_builtin(&mut self, key: &str, options: ParserOptions, parser: Box<dyn Parser>) {
        let entry = ParserEntry {
            key: key.to_string(),
            options,
            builtin: true,
            parser,
        };
        self.parsers.insert(key.to_string(), Arc::new(entry));
        self.order.push(key.to_string());
        self.replaceable.insert(key.to_string());
    }

    /// Register `parser` for `content_type` (`*` for the wildcard).
    pub fn add(
        &mut self,
        content_type: &str,
        options: ParserOptions,
        parser: Box<dyn Parser>,
    ) -> Result<(), RegistrationError> {
        let key = normalize_key(content_type)?;
        if options.body_limit == Some(0) {
            return Err(RegistrationError::InvalidBodyLimit);
        }

        let replacing_builtin = self.replaceable.remove(&key);
        if !replacing_builtin && self.parsers.contains_key(&key) {
            return Err(RegistrationError::AlreadyPresent(display_key(&key).to_string()));
        }

        let entry = ParserEntry {
            key: key.clone(),
            options,
            builtin: false,
            parser,
        };
        self.parsers.insert(key.clone(), Arc::new(entry));

        let keeps_slot = replacing_builtin && key == JSON;
        if key != WILDCARD && !keeps_slot {
            self.order.retain(|k| k != &key);
            self.order.insert(0, key.clone());
        }

        tracing::debug!(
            content_type = display_key(&key),
            replaced_builtin = replacing_builtin,
            materialized = options.materializes(),
            "Content type parser registered"
        );
        Ok(())
    }

    /// Whether a parser is registered under exactly this key.
    pub fn has(&self, content_type: &str) -> bool {
        self.get(content_type).is_some()
    }

    /// Entry registered under exactly this key.
    pub fn get(&self, content_type: &str) -> Option<Arc<ParserEntry>> {
        let key = normalize_key(content_type).ok()?;
        self.parsers.get(&key).cloned()
    }

    /// Remove the parser for this key. Returns whether one was registered.
    pub fn remove(&mut self, content_type: &str) -> bool {
        let Ok(key) = normalize_key(content_type) else {
            return false;
        };
        if self.parsers.remove(&key).is_none() {
            return false;
        }
        self.order.retain(|k| k != &key);
        self.replaceable.remove(&key);
        true
    }

    /// Drop every registration, built-ins included.
    pub fn clear(&mut self) {
        self.parsers.clear();
        self.order.clear();
        self.replaceable.clear();
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Find the parser for a raw content-type header.
    pub fn lookup(&self, header: &str) -> Option<Arc<ParserEntry>> {
        let header = header.trim().to_ascii_lowercase();

        if let Some(exact) = self.parsers.get(&header) {
            return Some(Arc::clone(exact));
        }

        self.order
            .iter()
            .find(|key| header.contains(key.as_str()))
            .and_then(|key| self.parsers.get(key))
            .or_else(|| self.parsers.get(WILDCARD))
            .cloned()
    }
}

fn normalize_key(content_type: &str) -> Result<String, RegistrationError> {
    let trimmed = content_type.trim();
    if trimmed.is_empty() {
        return Err(RegistrationError::EmptyType);
    }
    if trimmed == "*" {
        return Ok(WILDCARD.to_string());
    }
    if trimmed.chars().any(char::is_control) {
        return Err(RegistrationError::InvalidType(content_type.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn display_key(key: &str) -> &str {
    if key == WILDCARD {
        "*"
    } else {
        key
    }
}
