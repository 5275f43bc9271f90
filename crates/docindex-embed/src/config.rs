//! Embedding client configuration

use serde::{Deserialize, Serialize};

use docindex_core::env::{first_var, parse_var_or};
use docindex_core::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Configuration for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Maximum texts sent in one request
    pub batch_size: usize,
    /// Requested output dimensions, for models that support shortening
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = first_var(&["EMBEDDINGS_API_KEY", "RAG_OPENAI_API_KEY", "OPENAI_API_KEY"])
            .ok_or_else(|| {
                Error::Configuration(
                    "EMBEDDINGS_API_KEY or OPENAI_API_KEY environment variable not found"
                        .to_string(),
                )
            })?;

        let base_url = first_var(&["EMBEDDINGS_BASE_URL", "RAG_OPENAI_BASEURL"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = first_var(&["EMBEDDINGS_MODEL"]).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let dimensions = match first_var(&["EMBEDDINGS_DIMENSIONS"]) {
            Some(_) => Some(parse_var_or("EMBEDDINGS_DIMENSIONS", 0usize)?),
            None => None,
        };

        let config = Self {
            api_key,
            base_url,
            model,
            batch_size: parse_var_or("EMBEDDINGS_BATCH_SIZE", 200)?,
            dimensions,
            timeout_secs: parse_var_or("EMBEDDINGS_TIMEOUT_SECS", 30)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            batch_size: 200,
            dimensions: None,
            timeout_secs: 30,
        }
    }

    /// Point the client at another OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Full URL of the embeddings endpoint
    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "Invalid embeddings base URL: {}",
                self.base_url
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "Embedding batch size must be at least 1".to_string(),
            ));
        }
        if self.dimensions == Some(0) {
            return Err(Error::Configuration(
                "Embedding dimensions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
