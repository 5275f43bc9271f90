//! Embedding provider trait

use async_trait::async_trait;

use crate::{Error, Result};

/// Trait for embedding providers (e.g., OpenAI-compatible endpoints)
///
/// Implementations turn text into fixed-size vectors. Calls are independent,
/// so callers may issue several concurrently.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(Error::EmbeddingProvider(
                "Expected exactly one embedding for a single input".to_string(),
            )),
        }
    }

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
