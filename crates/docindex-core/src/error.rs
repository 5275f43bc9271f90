//! Error types for docindex

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the hybrid document index
#[derive(Error, Debug)]
pub enum Error {
    /// One document of a batch could not be embedded; the whole batch is unusable.
    #[error("Embedding failed for document {index}: {source}")]
    Embedding {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Transport-level failure reaching the storage backend.
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Storage backend rejected request with status {status}: {body}")]
    BackendRejected { status: u16, body: String },

    /// The backend answered, but not with the shape we expected.
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Search failed: {0}")]
    Search(#[source] Box<Error>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Wrap a failure raised while executing a search. Already-wrapped errors pass through.
    pub fn search(err: Error) -> Self {
        match err {
            Error::Search(_) => err,
            other => Error::Search(Box::new(other)),
        }
    }

    /// True when the backend responded with an unexpected payload.
    pub fn is_decode(&self) -> bool {
        match self {
            Error::Decode(_) => true,
            Error::Search(inner) => inner.is_decode(),
            _ => false,
        }
    }

    /// True when the backend could not be reached at all.
    pub fn is_backend_unavailable(&self) -> bool {
        match self {
            Error::BackendUnavailable(_) => true,
            Error::Search(inner) => inner.is_backend_unavailable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_wrapper_is_transparent_to_predicates() {
        let err = Error::search(Error::Decode("missing hits".to_string()));
        assert!(err.is_decode());
        assert!(!err.is_backend_unavailable());

        let err = Error::search(Error::BackendUnavailable("connection refused".to_string()));
        assert!(err.is_backend_unavailable());
        assert!(!err.is_decode());
    }

    #[test]
    fn test_search_wrapper_does_not_nest() {
        let err = Error::search(Error::search(Error::Decode("x".to_string())));
        match err {
            Error::Search(inner) => assert!(matches!(*inner, Error::Decode(_))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_embedding_error_display() {
        let err = Error::Embedding {
            index: 3,
            source: Box::new(Error::EmbeddingProvider("rate limited".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Embedding failed for document 3: Embedding provider error: rate limited"
        );
    }
}
