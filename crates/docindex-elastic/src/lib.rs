//! Elasticsearch storage backend for docindex
//!
//! This crate provides the REST implementation of the StorageBackend trait:
//! index creation with an explicit mapping, chunked NDJSON bulk writes,
//! `_search` for queries and aggregations, point-in-time paging and
//! delete-by-query.

mod bulk;
mod client;
mod config;


pub use bulk::{index_mapping, parse_bulk_response, render_bulk_body};
pub use client::{
    empty_aggregation_response, empty_search_response, is_index_not_found, ElasticsearchBackend,
};
pub use config::{ElasticAuth, ElasticConfig, DEFAULT_INDEX, DEFAULT_URL};

// Re-export core types for convenience
pub use docindex_core::{Error, Result, StorageBackend};
