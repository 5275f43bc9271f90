//! Decoding of raw backend responses

use serde::Deserialize;
use serde_json::Value;

use docindex_core::{Bucket, Document, Error, Metadata, Result, ScoredResult};

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
    #[serde(default)]
    pit_id: Option<String>,
}

/// One page of a point-in-time search
#[derive(Debug)]
pub struct HitPage {
    pub hits: Vec<Hit>,
    /// Point in time to continue with; may differ from the one sent
    pub pit_id: Option<String>,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

/// One entry of `hits.hits`
#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<HitSource>,
    /// Sort values, present when the request was sorted
    #[serde(default)]
    pub sort: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct HitSource {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl Hit {
    /// Strict conversion for search results: score, text and metadata must all be present
    pub fn into_scored(self) -> Result<ScoredResult> {
        let score = self
            .score
            .ok_or_else(|| Error::Decode(format!("Hit {} has no score", self.id)))?;
        let source = self
            .source
            .ok_or_else(|| Error::Decode(format!("Hit {} has no _source", self.id)))?;
        let content = source
            .text
            .ok_or_else(|| Error::Decode(format!("Hit {} has no text", self.id)))?;
        let metadata = source
            .metadata
            .ok_or_else(|| Error::Decode(format!("Hit {} has no metadata", self.id)))?;

        Ok(ScoredResult {
            document: Document { content, metadata },
            score,
        })
    }

    /// Lenient conversion for fetches: missing fields become empty
    pub fn into_document(self) -> Document {
        let source = self.source.unwrap_or(HitSource {
            text: None,
            metadata: None,
        });
        Document {
            content: source.text.unwrap_or_default(),
            metadata: source.metadata.unwrap_or_default(),
        }
    }
}

fn decode_search(body: Value) -> Result<SearchResponse> {
    serde_json::from_value(body).map_err(|e| Error::Decode(format!("Invalid search response: {e}")))
}

/// Extract `hits.hits` from a `_search` response
pub fn decode_hits(body: Value) -> Result<Vec<Hit>> {
    Ok(decode_search(body)?.hits.hits)
}

/// Extract `hits.hits` and the returned `pit_id` from a point-in-time search
pub fn decode_hit_page(body: Value) -> Result<HitPage> {
    let response = decode_search(body)?;
    Ok(HitPage {
        hits: response.hits.hits,
        pit_id: response.pit_id,
    })
}

#[derive(Deserialize)]
struct BucketList {
    buckets: Vec<RawBucket>,
}

#[derive(Deserialize)]
struct RawBucket {
    key: Value,
    doc_count: u64,
}

/// Extract the buckets of the terms aggregation called `name`
pub fn decode_buckets(body: Value, name: &str) -> Result<Vec<Bucket>> {
    let aggregation = body
        .get("aggregations")
        .and_then(|aggs| aggs.get(name))
        .cloned()
        .ok_or_else(|| Error::Decode(format!("Response has no aggregations.{name}")))?;

    let list: BucketList = serde_json::from_value(aggregation)
        .map_err(|e| Error::Decode(format!("Invalid aggregation {name}: {e}")))?;

    list.buckets
        .into_iter()
        .map(|bucket| {
            let key = match bucket.key {
                Value::String(key) => key,
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::Decode(format!("Unsupported bucket key: {other}")));
                }
            };
            Ok(Bucket {
                key,
                doc_count: bucket.doc_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_hits() {
        let body = json!({
            "took": 3,
            "hits": {
                "total": { "value": 1, "relation": "eq" },
                "hits": [{
                    "_index": "docs",
                    "_id": "doc42_0",
                    "_score": 3.25,
                    "_source": { "text": "alpha", "metadata": { "group_id": "doc42" } }
                }]
            }
        });

        let hits = decode_hits(body).unwrap();
        assert_eq!(hits.len(), 1);

        let scored = hits.into_iter().next().unwrap().into_scored().unwrap();
        assert_eq!(scored.score, 3.25);
        assert_eq!(scored.document.content, "alpha");
        assert_eq!(scored.document.group_id(), Some("doc42"));
    }

    #[test]
    fn test_missing_hits_is_decode_error() {
        let err = decode_hits(json!({ "took": 3 })).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_scored_hit_requires_source() {
        let hits = decode_hits(json!({ "hits": { "hits": [{ "_id": "a_0", "_score": 2.0 }] } }))
            .unwrap();
        let err = hits.into_iter().next().unwrap().into_scored().unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_lenient_document() {
        let hits = decode_hits(json!({
            "hits": { "hits": [{ "_id": "a_0", "_score": null, "_source": { "text": "only text" } }] }
        }))
        .unwrap();
        let doc = hits.into_iter().next().unwrap().into_document();
        assert_eq!(doc.content, "only text");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_decode_hit_page() {
        let page = decode_hit_page(json!({
            "pit_id": "pit-2",
            "hits": { "hits": [{ "_id": "a_0", "_score": null, "sort": ["a_0"] }] }
        }))
        .unwrap();
        assert_eq!(page.pit_id.as_deref(), Some("pit-2"));
        assert_eq!(page.hits[0].sort, Some(vec![json!("a_0")]));

        let page = decode_hit_page(json!({ "hits": { "hits": [] } })).unwrap();
        assert_eq!(page.pit_id, None);
    }

    #[test]
    fn test_decode_buckets() {
        let body = json!({
            "hits": { "hits": [] },
            "aggregations": {
                "groups": {
                    "doc_count_error_upper_bound": 0,
                    "buckets": [
                        { "key": "doc42", "doc_count": 3 },
                        { "key": 7, "doc_count": 1 }
                    ]
                }
            }
        });
        let buckets = decode_buckets(body, "groups").unwrap();
        assert_eq!(
            buckets,
            vec![
                Bucket { key: "doc42".to_string(), doc_count: 3 },
                Bucket { key: "7".to_string(), doc_count: 1 },
            ]
        );
    }

    #[test]
    fn test_missing_aggregation_is_decode_error() {
        let err = decode_buckets(json!({ "hits": { "hits": [] } }), "groups").unwrap_err();
        assert!(err.is_decode());
    }
}
