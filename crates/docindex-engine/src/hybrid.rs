//! Hybrid vector + keyword search scoped to document groups

use std::collections::HashSet;
use std::sync::Arc;

use docindex_core::{
    BoolQuery, Error, Query, Result, ScoredResult, Script, SearchRequest, StorageBackend,
    TEXT_FIELD, VECTOR_FIELD,
};

use crate::response::decode_hits;

/// Added to cosine similarity so the vector score stays in [0, 2]
pub const SIMILARITY_OFFSET: f64 = 1.0;

/// Runs one query that ORs cosine similarity with keyword match and keeps
/// only records of the requested groups.
pub struct HybridQueryEngine<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    max_results: Option<usize>,
}

impl<B: StorageBackend + ?Sized> HybridQueryEngine<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            max_results: None,
        }
    }

    /// Cap the number of hits returned per search
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    /// Build the search request without executing it
    pub fn build_request(
        &self,
        query_text: &str,
        query_vector: &[f32],
        group_ids: &[String],
        min_score: f64,
    ) -> SearchRequest {
        let similarity = Query::ScriptScore {
            query: Box::new(Query::MatchAll),
            script: Script::CosineSimilarity {
                field: VECTOR_FIELD.to_string(),
                query_vector: query_vector.to_vec(),
                offset: SIMILARITY_OFFSET,
            },
        };
        let keyword = Query::Match {
            field: TEXT_FIELD.to_string(),
            text: query_text.to_string(),
        };

        let mut request = SearchRequest::new(Query::Bool(BoolQuery {
            should: vec![similarity, keyword],
            must: vec![Query::group_ids(distinct(group_ids))],
            ..Default::default()
        }))
        .with_min_score(min_score);

        if let Some(max_results) = self.max_results {
            request = request.with_size(max_results);
        }
        request
    }

    /// Search records of `group_ids`, best first.
    ///
    /// Hits below `min_score` are excluded, not ranked lower. An empty
    /// `group_ids` yields no results.
    pub async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        group_ids: &[String],
        min_score: f64,
    ) -> Result<Vec<ScoredResult>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.build_request(query_text, query_vector, group_ids, min_score);
        let response = self.backend.search(&request).await.map_err(Error::search)?;
        let hits = decode_hits(response).map_err(Error::search)?;

        let allowed: HashSet<&str> = group_ids.iter().map(String::as_str).collect();
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit.id.clone();
            let result = hit.into_scored().map_err(Error::search)?;

            if result.score < min_score {
                tracing::warn!(id = %id, score = result.score, min_score, "backend returned hit below min_score");
                continue;
            }
            if !result.document.group_id().is_some_and(|g| allowed.contains(g)) {
                tracing::warn!(id = %id, "backend returned hit outside requested groups");
                continue;
            }
            results.push(result);
        }

        tracing::debug!(
            index = self.backend.index_name(),
            groups = group_ids.len(),
            results = results.len(),
            "hybrid search finished"
        );
        Ok(results)
    }
}

/// Drop repeated ids, keeping first occurrences in order
pub(crate) fn distinct(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
