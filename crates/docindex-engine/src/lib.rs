//! Hybrid document index engine
//!
//! Ingests groups of text chunks with one embedding per chunk and answers
//! hybrid queries that combine vector similarity with keyword match, scoped
//! to a set of document groups. Storage and embedding are pluggable through
//! the traits in `docindex-core`; an in-memory backend is included.

mod config;
mod engine;
mod fanout;
mod hybrid;
mod identity;
mod ingest;
mod memory;
mod response;


pub use config::{EngineConfig, StaleRecordPolicy, DEFAULT_EMBED_CONCURRENCY, DEFAULT_MIN_SCORE};
pub use engine::DocumentIndex;
pub use fanout::EmbeddingFanout;
pub use hybrid::{HybridQueryEngine, SIMILARITY_OFFSET};
pub use identity::{IdentityIndex, GROUPS_AGGREGATION, ID_PAGE_SIZE, PIT_KEEP_ALIVE};
pub use ingest::BulkIngestor;
pub use memory::InMemoryBackend;
pub use response::{decode_buckets, decode_hit_page, decode_hits, Hit, HitPage, HitSource};

// Re-export core types for convenience
pub use docindex_core::{
    Document, EmbeddingProvider, Error, IngestReport, Result, ScoredResult, StorageBackend,
};
