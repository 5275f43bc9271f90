//! Core traits and types for docindex
//!
//! Data model, structured query model, and the embedding provider and storage
//! backend traits the hybrid index engine is built on. Concrete adapters live
//! in sibling crates.

pub mod embedding;
pub mod env;
pub mod error;
pub mod ids;
pub mod query;
pub mod storage;
pub mod types;

pub use embedding::EmbeddingProvider;
pub use error::{Error, Result};
pub use ids::{assign_ids, record_id};
pub use query::{
    AggregationRequest, BoolQuery, PointInTime, Query, Script, SearchRequest, SourceFilter,
    GROUP_ID_PATH, METADATA_FIELD, SHARD_DOC_SORT, TEXT_FIELD, VECTOR_FIELD,
};
pub use storage::StorageBackend;
pub use types::*;
