//! Elasticsearch storage backend

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use docindex_core::{
    AggregationRequest, Error, IndexedRecord, Query, Result, SearchRequest, StorageBackend,
    UpsertOptions, UpsertSummary,
};

use crate::bulk::{index_mapping, parse_bulk_response, render_bulk_body};
use crate::config::{ElasticAuth, ElasticConfig};

/// Error type Elasticsearch reports for a request against a missing index
const INDEX_NOT_FOUND: &str = "index_not_found_exception";

/// True when `err` is a 404 caused by the index not existing yet
pub fn is_index_not_found(err: &Error) -> bool {
    matches!(err, Error::BackendRejected { status: 404, body } if body.contains(INDEX_NOT_FOUND))
}

/// `_search` response with no hits
pub fn empty_search_response() -> Value {
    json!({
        "took": 0,
        "timed_out": false,
        "hits": {
            "total": { "value": 0, "relation": "eq" },
            "max_score": null,
            "hits": [],
        }
    })
}

/// `_search` response whose aggregation `name` has no buckets
pub fn empty_aggregation_response(name: &str) -> Value {
    let mut body = empty_search_response();
    body["aggregations"] = json!({
        name: { "doc_count_error_upper_bound": 0, "sum_other_doc_count": 0, "buckets": [] }
    });
    body
}

/// Storage backend talking to an Elasticsearch cluster over its REST API
pub struct ElasticsearchBackend {
    config: ElasticConfig,
    client: Client,
    index_ready: AtomicBool,
}

impl ElasticsearchBackend {
    /// Create a new backend from configuration
    pub fn new(config: ElasticConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            config,
            client,
            index_ready: AtomicBool::new(false),
        })
    }

    /// Create a new backend from environment variables
    pub fn from_env() -> Result<Self> {
        let config = ElasticConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            ElasticAuth::None => request,
            ElasticAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            ElasticAuth::ApiKey(key) => request.header("Authorization", format!("ApiKey {key}")),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))
    }

    /// Turn a non-success status into an error, otherwise decode the JSON body
    async fn into_json(response: Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::BackendRejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("Response body is not JSON: {e}")))
    }

    fn index_endpoint(&self, path: &str) -> String {
        self.config.endpoint(&format!("{}/{}", self.config.index, path))
    }

    /// POST a search body; point-in-time searches must not name the index
    async fn post_search(&self, body: &Value, point_in_time: bool) -> Result<Value> {
        let url = if point_in_time {
            self.config.endpoint("_search")
        } else {
            self.index_endpoint("_search")
        };
        tracing::debug!(index = %self.config.index, body = %body, "search request");

        let response = self.send(self.client.post(url).json(body)).await?;
        Self::into_json(response).await
    }

    /// Make every earlier write visible to searches and deletes.
    ///
    /// Returns false when the index does not exist.
    async fn refresh(&self) -> Result<bool> {
        let response = self
            .send(self.client.post(self.index_endpoint("_refresh")))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::into_json(response).await?;
        Ok(true)
    }

    /// Create the index with the record mapping unless it already exists
    pub async fn ensure_index(&self, dims: usize) -> Result<()> {
        if self.index_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let url = self.config.endpoint(&self.config.index);
        let response = self.send(self.client.head(&url)).await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                tracing::info!(index = %self.config.index, dims, "creating index");
                let response = self
                    .send(self.client.put(&url).json(&index_mapping(dims)))
                    .await?;
                match Self::into_json(response).await {
                    Ok(_) => {}
                    // another writer created it between our HEAD and PUT
                    Err(Error::BackendRejected { status: 400, body })
                        if body.contains("resource_already_exists_exception") => {}
                    Err(e) => return Err(e),
                }
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::BackendRejected {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        self.index_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn bulk_chunk(&self, records: &[IndexedRecord], refresh: bool) -> Result<UpsertSummary> {
        let body = render_bulk_body(&self.config.index, records)?;
        let url = self.config.endpoint("_bulk");
        let refresh = if refresh { "true" } else { "false" };

        let response = self
            .send(
                self.client
                    .post(url)
                    .query(&[("refresh", refresh)])
                    .header("Content-Type", "application/x-ndjson")
                    .body(body),
            )
            .await?;
        let summary = parse_bulk_response(Self::into_json(response).await?)?;

        if !summary.is_complete() {
            tracing::warn!(
                index = %self.config.index,
                failed = summary.failed,
                first_error = summary.errors.first().map(String::as_str).unwrap_or_default(),
                "bulk request partially failed"
            );
        }
        Ok(summary)
    }
}

#[async_trait]
impl StorageBackend for ElasticsearchBackend {
    async fn bulk_upsert(
        &self,
        records: Vec<IndexedRecord>,
        options: &UpsertOptions,
    ) -> Result<UpsertSummary> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidInput("Bulk chunk size must be at least 1".to_string()));
        }
        let Some(first) = records.first() else {
            return Ok(UpsertSummary::default());
        };

        if options.create_index {
            self.ensure_index(first.vector.len()).await?;
        }

        let mut summary = UpsertSummary::default();
        for chunk in records.chunks(options.chunk_size) {
            summary.merge(self.bulk_chunk(chunk, options.refresh).await?);
        }

        tracing::debug!(
            index = %self.config.index,
            written = summary.written,
            failed = summary.failed,
            "bulk upsert finished"
        );
        Ok(summary)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Value> {
        match self
            .post_search(&request.to_dsl(), request.point_in_time.is_some())
            .await
        {
            Err(e) if is_index_not_found(&e) => Ok(empty_search_response()),
            result => result,
        }
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Value> {
        match self.post_search(&request.to_dsl(), false).await {
            Err(e) if is_index_not_found(&e) => Ok(empty_aggregation_response(&request.name)),
            result => result,
        }
    }

    async fn delete_by_query(&self, query: &Query) -> Result<u64> {
        // nothing to delete before the first write created the index
        if !self.refresh().await? {
            return Ok(0);
        }

        let url = self.index_endpoint("_delete_by_query");
        let body = json!({ "query": query.to_dsl() });

        let response = self
            .send(
                self.client
                    .post(url)
                    .query(&[("conflicts", "proceed"), ("refresh", "true")])
                    .json(&body),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let body = Self::into_json(response).await?;
        let deleted = body
            .get("deleted")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Decode("Delete response has no 'deleted' count".to_string()))?;

        tracing::debug!(index = %self.config.index, deleted, "delete by query finished");
        Ok(deleted)
    }

    async fn open_point_in_time(&self, keep_alive: &str) -> Result<Option<String>> {
        let response = self
            .send(
                self.client
                    .post(self.index_endpoint("_pit"))
                    .query(&[("keep_alive", keep_alive)]),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::into_json(response).await?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("Point in time response has no 'id'".to_string()))?;
        Ok(Some(id.to_string()))
    }

    async fn close_point_in_time(&self, id: &str) -> Result<()> {
        let response = self
            .send(
                self.client
                    .delete(self.config.endpoint("_pit"))
                    .json(&json!({ "id": id })),
            )
            .await?;
        // already expired
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::into_json(response).await?;
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.config.index
    }
}
