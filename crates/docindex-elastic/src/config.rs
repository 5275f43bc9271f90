//! Elasticsearch connection configuration

use serde::{Deserialize, Serialize};

use docindex_core::env::{first_var, parse_var_or};
use docindex_core::{Error, Result};

pub const DEFAULT_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX: &str = "testcollection";

/// Credentials sent with every request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ElasticAuth {
    #[default]
    None,
    Basic { username: String, password: String },
    ApiKey(String),
}

/// Configuration for the Elasticsearch backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticConfig {
    pub url: String,
    pub index: String,
    #[serde(skip)]
    pub auth: ElasticAuth,
    pub timeout_secs: u64,
}

impl ElasticConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = first_var(&["ELASTICSEARCH_URL", "ES_URL"]).unwrap_or_else(|| DEFAULT_URL.to_string());

        let index = first_var(&["ELASTICSEARCH_INDEX", "COLLECTION_NAME"])
            .unwrap_or_else(|| DEFAULT_INDEX.to_string());

        let auth = match (
            first_var(&["ELASTICSEARCH_API_KEY"]),
            first_var(&["ELASTICSEARCH_USERNAME"]),
            first_var(&["ELASTICSEARCH_PASSWORD"]),
        ) {
            (Some(key), _, _) => ElasticAuth::ApiKey(key),
            (None, Some(username), Some(password)) => ElasticAuth::Basic { username, password },
            (None, Some(_), None) => {
                return Err(Error::Configuration(
                    "ELASTICSEARCH_USERNAME is set but ELASTICSEARCH_PASSWORD is not".to_string(),
                ));
            }
            _ => ElasticAuth::None,
        };

        let config = Self {
            url,
            index,
            auth,
            timeout_secs: parse_var_or("ELASTICSEARCH_TIMEOUT_SECS", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: index.into(),
            auth: ElasticAuth::None,
            timeout_secs: 60,
        }
    }

    pub fn with_auth(mut self, auth: ElasticAuth) -> Self {
        self.auth = auth;
        self
    }

    /// URL of `path` on the cluster
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "Invalid Elasticsearch URL: {}",
                self.url
            )));
        }
        // Elasticsearch index names must be lowercase and must not contain path separators
        if self.index.is_empty()
            || self.index != self.index.to_lowercase()
            || self.index.contains(['/', '\\', '*', '?', '"', '<', '>', '|', ' ', ',', '#'])
        {
            return Err(Error::Configuration(format!(
                "Invalid Elasticsearch index name: {:?}",
                self.index
            )));
        }
        Ok(())
    }
}
