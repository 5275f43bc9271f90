//! Batched ingestion of document groups

use serde_json::Value;
use std::sync::Arc;

use docindex_core::{
    assign_ids, BoolQuery, Document, EmbeddingProvider, Error, IndexedRecord, IngestReport, Query,
    Result, StorageBackend, UpsertOptions, GROUP_ID_KEY,
};

use crate::config::{EngineConfig, StaleRecordPolicy};
use crate::fanout::EmbeddingFanout;

/// Embeds a group of documents and writes them with one bulk upsert.
///
/// Writes are not refreshed: a search issued right after `ingest` returns may
/// not see the new records yet.
pub struct BulkIngestor<B, E>
where
    B: StorageBackend + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    backend: Arc<B>,
    fanout: EmbeddingFanout<E>,
    options: UpsertOptions,
    stale_policy: StaleRecordPolicy,
}

impl<B, E> BulkIngestor<B, E>
where
    B: StorageBackend + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    pub fn new(backend: Arc<B>, provider: Arc<E>, config: &EngineConfig) -> Self {
        Self {
            backend,
            fanout: EmbeddingFanout::new(provider).with_concurrency(config.embed_concurrency),
            options: UpsertOptions {
                create_index: true,
                chunk_size: config.bulk_chunk_size,
                refresh: false,
            },
            stale_policy: config.stale_policy,
        }
    }

    pub fn options(&self) -> &UpsertOptions {
        &self.options
    }

    /// Ingest `documents` as group `group_id`.
    ///
    /// Record `i` gets id `{group_id}_{i}` and `metadata.group_id = group_id`.
    /// Nothing is written when any embedding fails. Stale records of the group
    /// are only purged once the new batch has been written, so a failed write
    /// leaves the previous batch in place.
    pub async fn ingest(&self, group_id: &str, documents: Vec<Document>) -> Result<IngestReport> {
        if group_id.is_empty() {
            return Err(Error::InvalidInput("Group id must not be empty".to_string()));
        }
        if documents.is_empty() {
            return Ok(IngestReport {
                group_id: group_id.to_string(),
                ..Default::default()
            });
        }

        let vectors = self.fanout.compute(&documents).await?;
        let ids = assign_ids(group_id, documents.len());

        let records: Vec<IndexedRecord> = ids
            .iter()
            .cloned()
            .zip(documents)
            .zip(vectors)
            .map(|((id, document), vector)| {
                let mut metadata = document.metadata;
                metadata.insert(GROUP_ID_KEY.to_string(), Value::from(group_id));
                IndexedRecord {
                    id,
                    content: document.content,
                    metadata,
                    vector,
                }
            })
            .collect();

        let summary = self.backend.bulk_upsert(records, &self.options).await?;

        let purged = match self.stale_policy {
            StaleRecordPolicy::PurgeGroup => {
                self.backend.delete_by_query(&stale_records(group_id, &ids)).await?
            }
            StaleRecordPolicy::Keep => 0,
        };

        tracing::info!(
            index = self.backend.index_name(),
            group_id,
            records = ids.len(),
            written = summary.written,
            failed = summary.failed,
            purged,
            "ingested group"
        );

        Ok(IngestReport {
            group_id: group_id.to_string(),
            ids,
            summary,
            purged,
        })
    }
}

/// Records of `group_id` other than the batch just written
fn stale_records(group_id: &str, current_ids: &[String]) -> Query {
    Query::Bool(BoolQuery {
        must: vec![Query::group_ids([group_id])],
        must_not: vec![Query::Ids(current_ids.to_vec())],
        ..Default::default()
    })
}
