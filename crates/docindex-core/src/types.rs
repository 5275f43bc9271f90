//! Data model shared by the engine and the backend adapters

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to a document.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key correlating a chunk with its logical source (e.g. one uploaded file).
pub const GROUP_ID_KEY: &str = "group_id";

/// Number of records sent per bulk network call.
pub const DEFAULT_BULK_CHUNK_SIZE: usize = 1000;

/// A chunk of text and its metadata, as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the group id this document belongs to
    pub fn with_group_id(self, group_id: impl Into<String>) -> Self {
        self.with_metadata(GROUP_ID_KEY, group_id.into())
    }

    /// The group id recorded in metadata, if any
    pub fn group_id(&self) -> Option<&str> {
        self.metadata.get(GROUP_ID_KEY).and_then(Value::as_str)
    }
}

/// The persisted form of a [`Document`].
///
/// `id` is unique within the backend; writing a record with an existing id
/// replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

impl IndexedRecord {
    /// Drop the id and vector, keeping what callers see
    pub fn into_document(self) -> Document {
        Document {
            content: self.content,
            metadata: self.metadata,
        }
    }
}

/// A search hit. `score` only orders results within the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub document: Document,
    pub score: f64,
}

/// Options for a bulk upsert call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertOptions {
    /// Create the index (and its mapping) when it does not exist yet
    pub create_index: bool,
    /// Maximum records per network request
    pub chunk_size: usize,
    /// Ask the backend to make the writes searchable before returning
    pub refresh: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            create_index: true,
            chunk_size: DEFAULT_BULK_CHUNK_SIZE,
            refresh: false,
        }
    }
}

/// Outcome of a bulk upsert as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub written: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl UpsertSummary {
    /// Fold the summary of another chunk into this one
    pub fn merge(&mut self, other: UpsertSummary) {
        self.written += other.written;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Result of an ingest call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub group_id: String,
    pub ids: Vec<String>,
    pub summary: UpsertSummary,
    /// Stale records of the group removed after writing, when the stale-record policy purges them
    pub purged: u64,
}

/// One bucket of a terms aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
}
