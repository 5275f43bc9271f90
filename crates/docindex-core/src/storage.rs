//! Storage backend trait

use async_trait::async_trait;
use serde_json::Value;

use crate::query::{AggregationRequest, Query, SearchRequest};
use crate::types::{IndexedRecord, UpsertOptions, UpsertSummary};
use crate::Result;

/// Trait for the searchable store holding indexed records (e.g., Elasticsearch)
///
/// `search` and `aggregate` return the raw response body in the Elasticsearch
/// `_search` response shape (`hits.hits[]`, `aggregations.<name>.buckets[]`).
/// Decoding it is left to the caller so a malformed response can be told
/// apart from a transport failure. Reads against an index that does not
/// exist yet answer with no hits and no buckets.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write records, replacing any record with the same id
    async fn bulk_upsert(
        &self,
        records: Vec<IndexedRecord>,
        options: &UpsertOptions,
    ) -> Result<UpsertSummary>;

    /// Execute a search and return the raw response
    async fn search(&self, request: &SearchRequest) -> Result<Value>;

    /// Execute a terms aggregation and return the raw response
    async fn aggregate(&self, request: &AggregationRequest) -> Result<Value>;

    /// Delete every record matching `query`, returning how many were removed.
    ///
    /// Records written by earlier calls are visible to the query even when
    /// they were written without a refresh.
    async fn delete_by_query(&self, query: &Query) -> Result<u64>;

    /// Delete every record whose group id equals `group_id`
    async fn delete_by_group(&self, group_id: &str) -> Result<u64> {
        self.delete_by_query(&Query::group_ids([group_id])).await
    }

    /// Open a point in time for paging over a stable view of the index.
    ///
    /// Returns `None` when the index does not exist yet.
    async fn open_point_in_time(&self, keep_alive: &str) -> Result<Option<String>>;

    /// Release a point in time opened with [`StorageBackend::open_point_in_time`]
    async fn close_point_in_time(&self, id: &str) -> Result<()>;

    /// Name of the index this backend reads and writes
    fn index_name(&self) -> &str;
}
