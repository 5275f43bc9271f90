//! OpenAI-compatible embeddings for docindex
//!
//! This crate provides the HTTP implementation of the EmbeddingProvider trait.

mod client;
mod config;


pub use client::OpenAiEmbeddings;
pub use config::{EmbeddingConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

// Re-export core types for convenience
pub use docindex_core::{EmbeddingProvider, Error, Result};
