//! In-memory storage backend
//!
//! Evaluates the structured query model directly against records held in a
//! map and answers in the same response shape as Elasticsearch, so the engine
//! decodes both the same way. Useful for tests and local experiments; nothing
//! is persisted.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use docindex_core::{
    AggregationRequest, Error, IndexedRecord, Query, Result, Script, SearchRequest, SourceFilter,
    StorageBackend, UpsertOptions, UpsertSummary, METADATA_FIELD, SHARD_DOC_SORT, TEXT_FIELD,
    VECTOR_FIELD,
};

/// Hits returned when a search does not set `size`
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Default)]
struct IndexState {
    records: HashMap<String, IndexedRecord>,
    /// Fixed by the first record written, like a dense_vector mapping
    dims: Option<usize>,
    open_pits: HashSet<String>,
    pits_opened: u64,
}

/// In-memory [`StorageBackend`]
pub struct InMemoryBackend {
    index: String,
    state: RwLock<IndexState>,
}

impl InMemoryBackend {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Fix the vector dimension up front instead of on first write
    pub fn with_dims(self, dims: usize) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.dims = Some(dims);
        }
        self
    }

    /// Number of stored records
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// A stored record by id
    pub fn get(&self, id: &str) -> Result<Option<IndexedRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    /// Number of points in time opened and not yet closed
    pub fn open_point_in_time_count(&self) -> Result<usize> {
        Ok(self.read()?.open_pits.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))
    }

    /// Matching records with their scores, best first, ties broken by id
    fn matching<'a>(
        records: impl Iterator<Item = &'a IndexedRecord>,
        query: &Query,
    ) -> Result<Vec<(&'a IndexedRecord, f64)>> {
        let mut matched = Vec::new();
        for record in records {
            if let Some(score) = evaluate(query, record)? {
                matched.push((record, score));
            }
        }
        matched.sort_by(|(a, a_score), (b, b_score)| {
            b_score.total_cmp(a_score).then_with(|| a.id.cmp(&b.id))
        });
        Ok(matched)
    }
}

/// Score of `record` under `query`, or `None` when it does not match
fn evaluate(query: &Query, record: &IndexedRecord) -> Result<Option<f64>> {
    let score = match query {
        Query::MatchAll => Some(1.0),
        Query::Ids(ids) => ids.iter().any(|id| *id == record.id).then_some(1.0),
        Query::Terms { field, values } => field_value(record, field)
            .filter(|value| values.contains(value))
            .map(|_| 1.0),
        Query::Match { field, text } => field_value(record, field)
            .map(|value| text_similarity(text, &value))
            .filter(|score| *score > 0.0),
        Query::ScriptScore { query, script } => match evaluate(query, record)? {
            Some(_) => Some(run_script(script, record)?),
            None => None,
        },
        Query::Bool(bool_query) => {
            for clause in &bool_query.must_not {
                if evaluate(clause, record)?.is_some() {
                    return Ok(None);
                }
            }
            if bool_query.must.is_empty() && bool_query.should.is_empty() {
                return Ok(Some(1.0));
            }

            let mut total = 0.0;
            for clause in &bool_query.must {
                match evaluate(clause, record)? {
                    Some(score) => total += score,
                    None => return Ok(None),
                }
            }

            let mut any_should = false;
            for clause in &bool_query.should {
                if let Some(score) = evaluate(clause, record)? {
                    any_should = true;
                    total += score;
                }
            }

            if bool_query.must.is_empty() && !any_should {
                None
            } else {
                Some(total)
            }
        }
    };
    Ok(score)
}

fn run_script(script: &Script, record: &IndexedRecord) -> Result<f64> {
    match script {
        Script::CosineSimilarity {
            field,
            query_vector,
            offset,
        } => {
            if field != VECTOR_FIELD {
                return Err(Error::BackendRejected {
                    status: 400,
                    body: format!("script_exception: unknown vector field [{field}]"),
                });
            }
            if query_vector.len() != record.vector.len() {
                return Err(Error::BackendRejected {
                    status: 400,
                    body: format!(
                        "script_exception: query vector has {} dimensions, field [{field}] has {}",
                        query_vector.len(),
                        record.vector.len()
                    ),
                });
            }
            Ok(cosine_similarity(query_vector, &record.vector) as f64 + offset)
        }
    }
}

/// Keyword value of `field` in the record: `text` or `metadata.<key>`
fn field_value(record: &IndexedRecord, field: &str) -> Option<String> {
    if field == TEXT_FIELD {
        return Some(record.content.clone());
    }
    let key = field.strip_prefix(METADATA_FIELD)?.strip_prefix('.')?;
    match record.metadata.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Share of query tokens present in `content`, in [0, 1]
fn text_similarity(query: &str, content: &str) -> f64 {
    let content_tokens: HashSet<String> = tokens(content).collect();
    let query_tokens: Vec<String> = tokens(query).collect();

    if query_tokens.is_empty() {
        return 0.0;
    }
    let matches = query_tokens
        .iter()
        .filter(|token| content_tokens.contains(*token))
        .count();
    matches as f64 / query_tokens.len() as f64
}

fn source_of(record: &IndexedRecord, filter: &SourceFilter) -> Option<Value> {
    let full = [
        (TEXT_FIELD, json!(record.content)),
        (METADATA_FIELD, Value::Object(record.metadata.clone())),
        (VECTOR_FIELD, json!(record.vector)),
    ];
    match filter {
        SourceFilter::Disabled => None,
        SourceFilter::All => Some(Value::Object(
            full.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )),
        SourceFilter::Includes(fields) => Some(Value::Object(
            full.into_iter()
                .filter(|(k, _)| fields.iter().any(|f| f == k))
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )),
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn bulk_upsert(
        &self,
        records: Vec<IndexedRecord>,
        options: &UpsertOptions,
    ) -> Result<UpsertSummary> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidInput("Bulk chunk size must be positive".to_string()));
        }

        let mut state = self.write()?;
        let mut summary = UpsertSummary::default();

        for record in records {
            let dims = *state.dims.get_or_insert(record.vector.len());
            if record.vector.len() != dims {
                summary.failed += 1;
                summary.errors.push(format!(
                    "{} (status 400): mapper_parsing_exception: vector has {} dimensions, expected {}",
                    record.id,
                    record.vector.len(),
                    dims
                ));
                continue;
            }
            state.records.insert(record.id.clone(), record);
            summary.written += 1;
        }

        tracing::debug!(
            index = %self.index,
            written = summary.written,
            failed = summary.failed,
            "in-memory bulk upsert"
        );
        Ok(summary)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Value> {
        let state = self.read()?;
        if let Some(pit) = &request.point_in_time {
            if !state.open_pits.contains(&pit.id) {
                return Err(Error::BackendRejected {
                    status: 404,
                    body: format!("search_context_missing_exception: no point in time [{}]", pit.id),
                });
            }
        }

        let mut matched = Self::matching(state.records.values(), &request.query)?;
        if let Some(min_score) = request.min_score {
            matched.retain(|(_, score)| *score >= min_score);
        }

        // records have one shard, so doc order is id order
        let sorted = !request.sort.is_empty();
        if let Some(field) = request.sort.iter().find(|field| *field != SHARD_DOC_SORT) {
            return Err(Error::BackendRejected {
                status: 400,
                body: format!("search_phase_execution_exception: cannot sort on [{field}]"),
            });
        }
        if sorted {
            matched.sort_by(|(a, _), (b, _)| a.id.cmp(&b.id));
            if let Some(after) = request
                .search_after
                .as_ref()
                .and_then(|values| values.first())
                .and_then(Value::as_str)
            {
                matched.retain(|(record, _)| record.id.as_str() > after);
            }
        }

        let total = matched.len();
        let max_score = matched.first().map(|(_, score)| *score);
        let hits: Vec<Value> = matched
            .into_iter()
            .skip(request.from.unwrap_or(0))
            .take(request.size.unwrap_or(DEFAULT_PAGE_SIZE))
            .map(|(record, score)| {
                let mut hit = Map::new();
                hit.insert("_index".to_string(), json!(self.index));
                hit.insert("_id".to_string(), json!(record.id));
                hit.insert("_score".to_string(), json!(score));
                if let Some(source) = source_of(record, &request.source) {
                    hit.insert("_source".to_string(), source);
                }
                if sorted {
                    hit.insert("sort".to_string(), json!([record.id]));
                }
                Value::Object(hit)
            })
            .collect();

        let mut body = json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "max_score": max_score,
                "hits": hits,
            }
        });
        if let Some(pit) = &request.point_in_time {
            body["pit_id"] = json!(pit.id);
        }
        Ok(body)
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Value> {
        let state = self.read()?;
        let matched = Self::matching(state.records.values(), &request.query)?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for (record, _) in &matched {
            if let Some(key) = field_value(record, &request.field) {
                *counts.entry(key).or_default() += 1;
            }
        }

        let mut buckets: Vec<(String, u64)> = counts.into_iter().collect();
        buckets.sort_by(|(a_key, a_count), (b_key, b_count)| {
            b_count.cmp(a_count).then_with(|| a_key.cmp(b_key))
        });
        let other: u64 = buckets.iter().skip(request.size).map(|(_, count)| count).sum();
        buckets.truncate(request.size);

        let mut aggregations = Map::new();
        aggregations.insert(
            request.name.clone(),
            json!({
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": other,
                "buckets": buckets
                    .into_iter()
                    .map(|(key, doc_count)| json!({ "key": key, "doc_count": doc_count }))
                    .collect::<Vec<_>>(),
            }),
        );

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": matched.len(), "relation": "eq" },
                "max_score": null,
                "hits": [],
            },
            "aggregations": aggregations,
        }))
    }

    async fn delete_by_query(&self, query: &Query) -> Result<u64> {
        let mut state = self.write()?;
        let doomed: Vec<String> = Self::matching(state.records.values(), query)?
            .into_iter()
            .map(|(record, _)| record.id.clone())
            .collect();
        for id in &doomed {
            state.records.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn open_point_in_time(&self, _keep_alive: &str) -> Result<Option<String>> {
        let mut state = self.write()?;
        state.pits_opened += 1;
        let id = format!("{}-pit-{}", self.index, state.pits_opened);
        state.open_pits.insert(id.clone());
        Ok(Some(id))
    }

    async fn close_point_in_time(&self, id: &str) -> Result<()> {
        self.write()?.open_pits.remove(id);
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
