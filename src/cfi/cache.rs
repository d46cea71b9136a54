//! Parse cache with LRU eviction
//!
//! Maps a raw CFI string (exact string equality) to its parsed address so
//! that annotations re-rendered on every layout pass are not re-parsed.
//!
//! Parsed addresses do not depend on the document, so entries stay valid
//! across content reloads. Owners call [`ParseCache::clear`] when they want
//! to drop everything, e.g. when switching publications.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::parser;
use super::types::ParsedAddress;
use crate::error::Result;

/// Default number of parsed addresses to keep
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache of parsed CFIs
///
/// Entries are shared as `Arc` and never mutated after insertion.
pub struct ParseCache {
    entries: LruCache<String, Arc<ParsedAddress>>,
    hits: u64,
    misses: u64,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ParseCache {
    /// Create a cache holding at most `capacity` addresses
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Parse `input`, reusing a cached result for an identical string
    ///
    /// Failed parses are not cached.
    pub fn parse(&mut self, input: &str) -> Result<Arc<ParsedAddress>> {
        if let Some(address) = self.entries.get(input) {
            self.hits += 1;
            tracing::trace!(cfi = input, "parse cache hit");
            return Ok(Arc::clone(address));
        }

        self.misses += 1;
        let address = Arc::new(parser::parse(input)?);
        self.entries.put(input.to_string(), Arc::clone(&address));
        Ok(address)
    }

    /// Look up a cached address without parsing
    pub fn peek(&self, input: &str) -> Option<Arc<ParsedAddress>> {
        self.entries.peek(input).cloned()
    }

    pub fn contains(&self, input: &str) -> bool {
        self.entries.contains(input)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached address
    pub fn clear(&mut self) {
        tracing::debug!(entries = self.entries.len(), "clearing parse cache");
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.entries.cap().get(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}
