//! Bulk API payloads and index mapping

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docindex_core::{Error, IndexedRecord, Metadata, Result, UpsertSummary};

#[derive(Serialize)]
struct IndexAction<'a> {
    index: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// The `_source` of a stored record
#[derive(Serialize)]
struct StoredSource<'a> {
    text: &'a str,
    metadata: &'a Metadata,
    vector: &'a [f32],
}

/// Render one `_bulk` request body: an `index` action line followed by the source line per record
pub fn render_bulk_body(index: &str, records: &[IndexedRecord]) -> Result<String> {
    let mut body = String::new();
    for record in records {
        let action = IndexAction {
            index: ActionMeta {
                index,
                id: &record.id,
            },
        };
        let source = StoredSource {
            text: &record.content,
            metadata: &record.metadata,
            vector: &record.vector,
        };
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&source)?);
        body.push('\n');
    }
    Ok(body)
}

/// Index mapping for stored records with `dims`-dimensional vectors
pub fn index_mapping(dims: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                "text": { "type": "text" },
                "metadata": {
                    "properties": {
                        "group_id": { "type": "keyword" }
                    }
                },
                "vector": {
                    "type": "dense_vector",
                    "dims": dims,
                    "index": true,
                    "similarity": "cosine"
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct BulkResponse {
    errors: bool,
    items: Vec<BulkItem>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(alias = "create", alias = "update")]
    index: BulkItemResult,
}

#[derive(Deserialize)]
struct BulkItemResult {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Summarize a `_bulk` response, collecting per-item failures
pub fn parse_bulk_response(body: Value) -> Result<UpsertSummary> {
    let response: BulkResponse = serde_json::from_value(body)
        .map_err(|e| Error::Decode(format!("Invalid bulk response: {e}")))?;

    let mut summary = UpsertSummary::default();
    for item in response.items {
        let result = item.index;
        if result.error.is_none() && (200..300).contains(&result.status) {
            summary.written += 1;
            continue;
        }
        summary.failed += 1;
        let reason = result
            .error
            .as_ref()
            .and_then(|e| e.get("reason").or_else(|| e.get("type")))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        summary.errors.push(format!(
            "{} (status {}): {}",
            result.id.as_deref().unwrap_or("<no id>"),
            result.status,
            reason
        ));
    }

    if response.errors && summary.failed == 0 {
        return Err(Error::Decode(
            "Bulk response reports errors but no failed item".to_string(),
        ));
    }
    Ok(summary)
}
