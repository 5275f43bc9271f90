//! Id and group membership queries

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use docindex_core::{
    AggregationRequest, Document, Error, PointInTime, Query, Result, SearchRequest, SourceFilter,
    StorageBackend, GROUP_ID_PATH, METADATA_FIELD, SHARD_DOC_SORT, TEXT_FIELD,
};

use crate::hybrid::distinct;
use crate::response::{decode_buckets, decode_hit_page, decode_hits};

/// Records fetched per request while enumerating or fetching ids
pub const ID_PAGE_SIZE: usize = 1000;
/// How long the backend keeps a point in time alive between pages
pub const PIT_KEEP_ALIVE: &str = "1m";
/// Name of the group-by aggregation in requests and responses
pub const GROUPS_AGGREGATION: &str = "groups";

/// Membership queries over the index, plus whole-group deletion
pub struct IdentityIndex<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    page_size: usize,
}

impl<B: StorageBackend + ?Sized> IdentityIndex<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            page_size: ID_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Every record id in the index, in index order.
    ///
    /// Pages through a point in time with `search_after`, so the walk is not
    /// bounded by the backend's result window. Unbounded; meant for
    /// maintenance, not request paths.
    pub async fn all_ids(&self) -> Result<Vec<String>> {
        let Some(mut pit_id) = self.backend.open_point_in_time(PIT_KEEP_ALIVE).await? else {
            return Ok(Vec::new());
        };

        let result = self.walk_ids(&mut pit_id).await;
        if let Err(e) = self.backend.close_point_in_time(&pit_id).await {
            tracing::warn!(index = self.backend.index_name(), error = %e, "failed to close point in time");
        }

        let ids = result?;
        tracing::debug!(index = self.backend.index_name(), count = ids.len(), "enumerated ids");
        Ok(ids)
    }

    async fn walk_ids(&self, pit_id: &mut String) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut search_after: Option<Vec<Value>> = None;

        loop {
            let mut request = SearchRequest::new(Query::MatchAll)
                .with_source(SourceFilter::Disabled)
                .with_size(self.page_size)
                .with_sort(SHARD_DOC_SORT)
                .with_point_in_time(PointInTime {
                    id: pit_id.clone(),
                    keep_alive: PIT_KEEP_ALIVE.to_string(),
                });
            if let Some(after) = search_after.take() {
                request = request.with_search_after(after);
            }

            let page = decode_hit_page(self.backend.search(&request).await?)?;
            if let Some(next) = page.pit_id {
                *pit_id = next;
            }

            let fetched = page.hits.len();
            for hit in page.hits {
                search_after = Some(
                    hit.sort
                        .ok_or_else(|| Error::Decode(format!("Hit {} has no sort values", hit.id)))?,
                );
                ids.push(hit.id);
            }

            if fetched < self.page_size {
                return Ok(ids);
            }
        }
    }

    /// Stored documents for `ids`, without vectors. Unknown ids are skipped.
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = distinct(ids);
        let mut documents = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.page_size) {
            let request = SearchRequest::new(Query::Ids(chunk.to_vec()))
                .with_size(chunk.len())
                .with_source(SourceFilter::Includes(vec![
                    TEXT_FIELD.to_string(),
                    METADATA_FIELD.to_string(),
                ]));

            let hits = decode_hits(self.backend.search(&request).await?)?;
            documents.extend(hits.into_iter().map(|hit| hit.into_document()));
        }
        Ok(documents)
    }

    /// The subset of `group_ids` with at least one indexed record, in input order
    pub async fn filter_existing_group_ids(&self, group_ids: &[String]) -> Result<Vec<String>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        // one bucket per distinct candidate, so no existing group can be truncated away
        let candidates = distinct(group_ids);
        let request = AggregationRequest {
            query: Query::group_ids(candidates.clone()),
            name: GROUPS_AGGREGATION.to_string(),
            field: GROUP_ID_PATH.to_string(),
            size: candidates.len(),
        };

        let buckets = decode_buckets(self.backend.aggregate(&request).await?, GROUPS_AGGREGATION)?;
        let existing: HashSet<String> = buckets
            .into_iter()
            .filter(|bucket| bucket.doc_count > 0)
            .map(|bucket| bucket.key)
            .collect();

        Ok(candidates
            .into_iter()
            .filter(|group_id| existing.contains(group_id))
            .collect())
    }

    /// Number of records indexed under `group_id`
    pub async fn count_group_records(&self, group_id: &str) -> Result<u64> {
        let request = AggregationRequest {
            query: Query::group_ids([group_id]),
            name: GROUPS_AGGREGATION.to_string(),
            field: GROUP_ID_PATH.to_string(),
            size: 1,
        };

        let buckets = decode_buckets(self.backend.aggregate(&request).await?, GROUPS_AGGREGATION)?;
        Ok(buckets
            .into_iter()
            .find(|bucket| bucket.key == group_id)
            .map_or(0, |bucket| bucket.doc_count))
    }

    /// Remove every record of `group_id`, returning how many were deleted
    pub async fn delete_group(&self, group_id: &str) -> Result<u64> {
        if group_id.is_empty() {
            return Err(Error::InvalidInput("Group id must not be empty".to_string()));
        }
        let deleted = self.backend.delete_by_group(group_id).await?;
        tracing::info!(index = self.backend.index_name(), group_id, deleted, "deleted group");
        Ok(deleted)
    }
}
