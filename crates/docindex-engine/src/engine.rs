//! Document index facade

use std::sync::Arc;

use docindex_core::{
    Document, EmbeddingProvider, Error, IngestReport, Result, ScoredResult, StorageBackend,
};

use crate::config::EngineConfig;
use crate::hybrid::HybridQueryEngine;
use crate::identity::IdentityIndex;
use crate::ingest::BulkIngestor;

/// Wires an embedding provider and a storage backend into one index.
///
/// All parts share the same backend handle; the facade holds no state of
/// its own and can be shared across tasks.
pub struct DocumentIndex<B, E>
where
    B: StorageBackend + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    provider: Arc<E>,
    backend: Arc<B>,
    ingestor: BulkIngestor<B, E>,
    query: HybridQueryEngine<B>,
    identity: IdentityIndex<B>,
    config: EngineConfig,
}

impl<B, E> DocumentIndex<B, E>
where
    B: StorageBackend + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    pub fn new(backend: Arc<B>, provider: Arc<E>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        tracing::debug!(
            index = backend.index_name(),
            model = provider.model_id(),
            "document index ready"
        );

        Ok(Self {
            ingestor: BulkIngestor::new(backend.clone(), provider.clone(), &config),
            query: HybridQueryEngine::new(backend.clone()).with_max_results(config.max_results),
            identity: IdentityIndex::new(backend.clone()),
            provider,
            backend,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// See [`BulkIngestor::ingest`]
    pub async fn ingest(&self, group_id: &str, documents: Vec<Document>) -> Result<IngestReport> {
        self.ingestor.ingest(group_id, documents).await
    }

    /// Embed `query_text` and run a hybrid search over `group_ids`
    pub async fn search(&self, query_text: &str, group_ids: &[String]) -> Result<Vec<ScoredResult>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .provider
            .embed_one(query_text)
            .await
            .map_err(Error::search)?;
        self.search_by_vector(query_text, &query_vector, group_ids)
            .await
    }

    /// Hybrid search with a precomputed query vector
    pub async fn search_by_vector(
        &self,
        query_text: &str,
        query_vector: &[f32],
        group_ids: &[String],
    ) -> Result<Vec<ScoredResult>> {
        self.query
            .search(query_text, query_vector, group_ids, self.config.min_score)
            .await
    }

    pub async fn all_ids(&self) -> Result<Vec<String>> {
        self.identity.all_ids().await
    }

    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Document>> {
        self.identity.fetch_by_ids(ids).await
    }

    pub async fn filter_existing_group_ids(&self, group_ids: &[String]) -> Result<Vec<String>> {
        self.identity.filter_existing_group_ids(group_ids).await
    }

    pub async fn count_group_records(&self, group_id: &str) -> Result<u64> {
        self.identity.count_group_records(group_id).await
    }

    /// Remove every record of `group_id`, returning how many were deleted
    pub async fn delete_group(&self, group_id: &str) -> Result<u64> {
        self.identity.delete_group(group_id).await
    }
}
