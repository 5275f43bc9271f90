//! Structured query model
//!
//! Queries are built as plain Rust values and rendered to the Elasticsearch
//! query DSL with [`SearchRequest::to_dsl`]. Backends that do not speak the DSL
//! (such as the in-memory backend) evaluate the same values directly.

use serde_json::{json, Map, Value};

/// Field holding the document text in stored records
pub const TEXT_FIELD: &str = "text";
/// Field holding the document metadata in stored records
pub const METADATA_FIELD: &str = "metadata";
/// Field holding the embedding in stored records
pub const VECTOR_FIELD: &str = "vector";
/// Path of the group id inside stored records
pub const GROUP_ID_PATH: &str = "metadata.group_id";
/// Tiebreaker sort for paging over a point in time
pub const SHARD_DOC_SORT: &str = "_shard_doc";

/// A query clause
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every record with a constant score of 1.0
    MatchAll,
    /// Matches records whose id is in the list
    Ids(Vec<String>),
    /// Matches records whose `field` equals one of `values` exactly
    Terms { field: String, values: Vec<String> },
    /// Full-text match of `text` against `field`
    Match { field: String, text: String },
    /// Replaces the score of records matched by `query` with the script result
    ScriptScore { query: Box<Query>, script: Script },
    Bool(BoolQuery),
}

/// Boolean combination of clauses.
///
/// Every `must` clause has to match and contributes to the score. `should`
/// clauses contribute when they match; they are only required when `must`
/// is empty. A record matching any `must_not` clause is excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
}

/// Scoring scripts understood by the backends
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// `cosineSimilarity(query_vector, field) + offset`
    CosineSimilarity {
        field: String,
        query_vector: Vec<f32>,
        offset: f64,
    },
}

impl Script {
    pub fn source(&self) -> String {
        match self {
            Script::CosineSimilarity { field, offset, .. } => {
                format!("cosineSimilarity(params.query_vector, '{field}') + {offset:?}")
            }
        }
    }

    fn to_dsl(&self) -> Value {
        match self {
            Script::CosineSimilarity { query_vector, .. } => json!({
                "source": self.source(),
                "params": { "query_vector": query_vector },
            }),
        }
    }
}

impl Query {
    /// Terms clause restricting records to the given group ids
    pub fn group_ids<I, S>(group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Terms {
            field: GROUP_ID_PATH.to_string(),
            values: group_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Render the clause as Elasticsearch query DSL
    pub fn to_dsl(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Ids(ids) => json!({ "ids": { "values": ids } }),
            Query::Terms { field, values } => {
                let mut terms = Map::new();
                terms.insert(field.clone(), json!(values));
                json!({ "terms": terms })
            }
            Query::Match { field, text } => {
                let mut matcher = Map::new();
                matcher.insert(field.clone(), json!({ "query": text }));
                json!({ "match": matcher })
            }
            Query::ScriptScore { query, script } => json!({
                "script_score": {
                    "query": query.to_dsl(),
                    "script": script.to_dsl(),
                }
            }),
            Query::Bool(bool_query) => {
                let mut clauses = Map::new();
                if !bool_query.should.is_empty() {
                    clauses.insert(
                        "should".to_string(),
                        Value::Array(bool_query.should.iter().map(Query::to_dsl).collect()),
                    );
                }
                if !bool_query.must.is_empty() {
                    clauses.insert(
                        "must".to_string(),
                        Value::Array(bool_query.must.iter().map(Query::to_dsl).collect()),
                    );
                }
                if !bool_query.must_not.is_empty() {
                    clauses.insert(
                        "must_not".to_string(),
                        Value::Array(bool_query.must_not.iter().map(Query::to_dsl).collect()),
                    );
                }
                json!({ "bool": clauses })
            }
        }
    }
}

/// Which parts of the stored record a search should return
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SourceFilter {
    #[default]
    All,
    /// Ids and scores only
    Disabled,
    Includes(Vec<String>),
}

/// A consistent view of the index that searches can page over
#[derive(Debug, Clone, PartialEq)]
pub struct PointInTime {
    pub id: String,
    /// How long the backend keeps the view alive between requests, e.g. `1m`
    pub keep_alive: String,
}

/// A search against the index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    /// Hits scoring below this are dropped entirely
    pub min_score: Option<f64>,
    /// Maximum hits to return; the backend default applies when unset
    pub size: Option<usize>,
    pub from: Option<usize>,
    pub source: SourceFilter,
    /// Fields to sort by, ascending; score order when empty
    pub sort: Vec<String>,
    /// Sort values of the last hit of the previous page
    pub search_after: Option<Vec<Value>>,
    /// Searches over a point in time are not bound to a single index
    pub point_in_time: Option<PointInTime>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            min_score: None,
            size: None,
            from: None,
            source: SourceFilter::All,
            sort: Vec::new(),
            search_after: None,
            point_in_time: None,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_source(mut self, source: SourceFilter) -> Self {
        self.source = source;
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>) -> Self {
        self.sort.push(field.into());
        self
    }

    pub fn with_search_after(mut self, values: Vec<Value>) -> Self {
        self.search_after = Some(values);
        self
    }

    pub fn with_point_in_time(mut self, point_in_time: PointInTime) -> Self {
        self.point_in_time = Some(point_in_time);
        self
    }

    /// Render the request body for `POST /{index}/_search`
    pub fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_dsl());
        if let Some(min_score) = self.min_score {
            body.insert("min_score".to_string(), json!(min_score));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        match &self.source {
            SourceFilter::All => {}
            SourceFilter::Disabled => {
                body.insert("_source".to_string(), json!(false));
                body.insert("stored_fields".to_string(), json!([]));
            }
            SourceFilter::Includes(fields) => {
                body.insert("_source".to_string(), json!(fields));
            }
        }
        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|field| {
                    let mut order = Map::new();
                    order.insert(field.clone(), json!("asc"));
                    Value::Object(order)
                })
                .collect();
            body.insert("sort".to_string(), Value::Array(sort));
        }
        if let Some(search_after) = &self.search_after {
            body.insert("search_after".to_string(), json!(search_after));
        }
        if let Some(pit) = &self.point_in_time {
            body.insert(
                "pit".to_string(),
                json!({ "id": pit.id, "keep_alive": pit.keep_alive }),
            );
        }
        Value::Object(body)
    }
}

/// A terms aggregation counting records per distinct value of `field`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub query: Query,
    /// Name under which the buckets appear in the response
    pub name: String,
    pub field: String,
    /// Maximum number of buckets returned
    pub size: usize,
}

impl AggregationRequest {
    /// Render the request body for `POST /{index}/_search`
    pub fn to_dsl(&self) -> Value {
        let mut aggs = Map::new();
        aggs.insert(
            self.name.clone(),
            json!({ "terms": { "field": self.field, "size": self.size } }),
        );
        json!({
            "query": self.query.to_dsl(),
            "size": 0,
            "aggs": aggs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hybrid_query() -> Query {
        Query::Bool(BoolQuery {
            should: vec![
                Query::ScriptScore {
                    query: Box::new(Query::MatchAll),
                    script: Script::CosineSimilarity {
                        field: VECTOR_FIELD.to_string(),
                        query_vector: vec![0.5, -0.25],
                        offset: 1.0,
                    },
                },
                Query::Match {
                    field: TEXT_FIELD.to_string(),
                    text: "alpha".to_string(),
                },
            ],
            must: vec![Query::group_ids(["doc42"])],
            ..Default::default()
        })
    }

    #[test]
    fn test_script_source() {
        let script = Script::CosineSimilarity {
            field: "vector".to_string(),
            query_vector: vec![],
            offset: 1.0,
        };
        insta::assert_snapshot!(script.source(), @"cosineSimilarity(params.query_vector, 'vector') + 1.0");
    }

    #[test]
    fn test_hybrid_search_dsl() {
        let request = SearchRequest::new(hybrid_query()).with_min_score(1.5);

        assert_eq!(
            request.to_dsl(),
            json!({
                "min_score": 1.5,
                "query": {
                    "bool": {
                        "should": [
                            {
                                "script_score": {
                                    "query": { "match_all": {} },
                                    "script": {
                                        "source": "cosineSimilarity(params.query_vector, 'vector') + 1.0",
                                        "params": { "query_vector": [0.5, -0.25] }
                                    }
                                }
                            },
                            { "match": { "text": { "query": "alpha" } } }
                        ],
                        "must": [
                            { "terms": { "metadata.group_id": ["doc42"] } }
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn test_source_filters() {
        let disabled = SearchRequest::new(Query::MatchAll)
            .with_source(SourceFilter::Disabled)
            .with_size(1000)
            .with_from(2000)
            .to_dsl();
        assert_eq!(
            disabled,
            json!({
                "query": { "match_all": {} },
                "size": 1000,
                "from": 2000,
                "_source": false,
                "stored_fields": []
            })
        );

        let includes = SearchRequest::new(Query::Ids(vec!["a_0".to_string()]))
            .with_source(SourceFilter::Includes(vec![
                TEXT_FIELD.to_string(),
                METADATA_FIELD.to_string(),
            ]))
            .to_dsl();
        assert_eq!(
            includes,
            json!({
                "query": { "ids": { "values": ["a_0"] } },
                "_source": ["text", "metadata"]
            })
        );
    }

    #[test]
    fn test_aggregation_dsl() {
        let request = AggregationRequest {
            query: Query::group_ids(["doc42", "doc99"]),
            name: "groups".to_string(),
            field: GROUP_ID_PATH.to_string(),
            size: 2,
        };

        assert_eq!(
            request.to_dsl(),
            json!({
                "query": { "terms": { "metadata.group_id": ["doc42", "doc99"] } },
                "size": 0,
                "aggs": {
                    "groups": { "terms": { "field": "metadata.group_id", "size": 2 } }
                }
            })
        );
    }

    #[test]
    fn test_point_in_time_page_dsl() {
        let request = SearchRequest::new(Query::MatchAll)
            .with_source(SourceFilter::Disabled)
            .with_size(1000)
            .with_sort(SHARD_DOC_SORT)
            .with_search_after(vec![json!(4294967308u64)])
            .with_point_in_time(PointInTime {
                id: "46ToAwMDaWR5BXV1aWQy".to_string(),
                keep_alive: "1m".to_string(),
            });

        assert_eq!(
            request.to_dsl(),
            json!({
                "query": { "match_all": {} },
                "size": 1000,
                "_source": false,
                "stored_fields": [],
                "sort": [{ "_shard_doc": "asc" }],
                "search_after": [4294967308u64],
                "pit": { "id": "46ToAwMDaWR5BXV1aWQy", "keep_alive": "1m" }
            })
        );
    }

    #[test]
    fn test_must_not_dsl() {
        let query = Query::Bool(BoolQuery {
            must: vec![Query::group_ids(["doc7"])],
            must_not: vec![Query::Ids(vec!["doc7_0".to_string()])],
            ..Default::default()
        });
        assert_eq!(
            query.to_dsl(),
            json!({
                "bool": {
                    "must": [{ "terms": { "metadata.group_id": ["doc7"] } }],
                    "must_not": [{ "ids": { "values": ["doc7_0"] } }]
                }
            })
        );
    }

    #[test]
    fn test_empty_bool_renders_empty_object() {
        let query = Query::Bool(BoolQuery::default());
        assert_eq!(query.to_dsl(), json!({ "bool": {} }));
    }
}
