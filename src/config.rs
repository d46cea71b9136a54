//! Configuration management for the CFI engine

use serde::Deserialize;
use std::env;

use crate::cfi::{DocumentStep, DEFAULT_CACHE_CAPACITY};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Parsed CFIs kept by each parse cache
    pub cache_capacity: usize,
    /// Package part used when generating CFIs, e.g. `/6/12!`
    pub document_step: Option<DocumentStep>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            document_step: None,
        }
    }
}

impl EngineConfig {
    /// Read `CFI_CACHE_CAPACITY` and `CFI_DOCUMENT_STEP`
    ///
    /// An unreadable capacity falls back to the default; a document step that
    /// is set but malformed is an error.
    pub fn from_env() -> Result<Self> {
        let cache_capacity = match env::var("CFI_CACHE_CAPACITY") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid CFI_CACHE_CAPACITY, using default");
                DEFAULT_CACHE_CAPACITY
            }),
            Err(_) => DEFAULT_CACHE_CAPACITY,
        };

        let document_step = env::var("CFI_DOCUMENT_STEP")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| DocumentStep::parse(&raw))
            .transpose()?;

        Ok(EngineConfig {
            cache_capacity,
            document_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(config.document_step.is_none());
    }

    #[test]
    fn test_deserialize() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"cache_capacity": 16, "document_step": {"steps": [{"index": 6, "redirection": false}, {"index": 4, "redirection": true}]}}"#,
        )
        .unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(
            config.document_step.map(|step| step.to_string()),
            Some("/6/4!".to_string())
        );
    }
}
