//! Engine configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use docindex_core::env::{first_var, parse_var_or};
use docindex_core::{Error, Result, DEFAULT_BULK_CHUNK_SIZE};

pub const DEFAULT_EMBED_CONCURRENCY: usize = 10;
pub const DEFAULT_MIN_SCORE: f64 = 1.5;

/// What happens to a group's existing records when it is ingested again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleRecordPolicy {
    /// Overwrite by id only. Records beyond the new batch length stay in the index.
    Keep,
    /// Delete every record of the group before writing the new batch
    #[default]
    PurgeGroup,
}

impl FromStr for StaleRecordPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "overwrite" => Ok(StaleRecordPolicy::Keep),
            "purge" | "purge_group" | "replace" => Ok(StaleRecordPolicy::PurgeGroup),
            other => Err(Error::Configuration(format!(
                "Unknown stale record policy: {other}"
            ))),
        }
    }
}

/// Configuration for the document index engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding calls in flight at once during ingest
    pub embed_concurrency: usize,
    /// Records per bulk network request
    pub bulk_chunk_size: usize,
    /// Hits scoring below this are excluded from search results
    pub min_score: f64,
    /// Maximum search hits; the backend default applies when unset
    pub max_results: Option<usize>,
    pub stale_policy: StaleRecordPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
            bulk_chunk_size: DEFAULT_BULK_CHUNK_SIZE,
            min_score: DEFAULT_MIN_SCORE,
            max_results: None,
            stale_policy: StaleRecordPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let max_results = match first_var(&["DOCINDEX_MAX_RESULTS"]) {
            Some(_) => Some(parse_var_or("DOCINDEX_MAX_RESULTS", 0usize)?),
            None => None,
        };
        let stale_policy = match first_var(&["DOCINDEX_STALE_POLICY"]) {
            Some(raw) => raw.parse()?,
            None => defaults.stale_policy,
        };

        let config = Self {
            embed_concurrency: parse_var_or("DOCINDEX_EMBED_CONCURRENCY", defaults.embed_concurrency)?,
            bulk_chunk_size: parse_var_or("DOCINDEX_BULK_CHUNK_SIZE", defaults.bulk_chunk_size)?,
            min_score: parse_var_or("DOCINDEX_MIN_SCORE", defaults.min_score)?,
            max_results,
            stale_policy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_embed_concurrency(mut self, embed_concurrency: usize) -> Self {
        self.embed_concurrency = embed_concurrency;
        self
    }

    pub fn with_bulk_chunk_size(mut self, bulk_chunk_size: usize) -> Self {
        self.bulk_chunk_size = bulk_chunk_size;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_stale_policy(mut self, stale_policy: StaleRecordPolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.embed_concurrency == 0 {
            return Err(Error::Configuration(
                "Embedding concurrency must be at least 1".to_string(),
            ));
        }
        if self.bulk_chunk_size == 0 {
            return Err(Error::Configuration(
                "Bulk chunk size must be at least 1".to_string(),
            ));
        }
        if !self.min_score.is_finite() {
            return Err(Error::Configuration(format!(
                "Minimum score must be finite, got {}",
                self.min_score
            )));
        }
        if self.max_results == Some(0) {
            return Err(Error::Configuration(
                "Maximum results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_snapshot() {
        insta::assert_yaml_snapshot!(EngineConfig::default(), @r#"
        embed_concurrency: 10
        bulk_chunk_size: 1000
        min_score: 1.5
        max_results: ~
        stale_policy: purge_group
        "#);
    }

    #[test]
    fn test_stale_policy_from_str() {
        assert_eq!("keep".parse::<StaleRecordPolicy>().unwrap(), StaleRecordPolicy::Keep);
        assert_eq!(
            " Purge ".parse::<StaleRecordPolicy>().unwrap(),
            StaleRecordPolicy::PurgeGroup
        );
        assert!("sometimes".parse::<StaleRecordPolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(EngineConfig::default().with_embed_concurrency(0).validate().is_err());
        assert!(EngineConfig::default().with_bulk_chunk_size(0).validate().is_err());
        assert!(EngineConfig::default().with_max_results(0).validate().is_err());
        assert!(EngineConfig::default().with_min_score(f64::NAN).validate().is_err());
        assert!(EngineConfig::default().validate().is_ok());
    }
}
