//! # duckstore - DuckDB document store for retrieval pipelines
//!
//! Stores retrieval-framework documents in an embedded DuckDB database and
//! queries them back, either by metadata filters or by vector similarity.
//!
//! duckstore provides:
//! - A `Document` model with content-hash ids, blobs and embeddings
//! - A flat relational table with a `FLOAT[n]` vector column and an HNSW index
//! - Framework-style filter dictionaries translated to parameterized SQL
//! - An embedding retriever on top of the store

pub mod document;
pub mod filters;
pub mod store;
pub mod config;
pub mod storage;
pub mod retriever;
pub mod embedding;
pub mod fixtures;
pub mod profile;
pub mod ui;

// Re-exports for convenient access
pub use document::{ByteStream, Document, SparseEmbedding};
pub use filters::{ComparisonOp, Filter, FilterPolicy, LogicOp};
pub use store::{DocumentStore, DuplicatePolicy};
pub use config::{SimilarityMetric, StoreConfig};
pub use storage::DuckDbDocumentStore;
pub use retriever::{DuckDbEmbeddingRetriever, RetrieverOutput};

/// Result type alias for duckstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for duckstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Storage error: {0}")]
    Storage(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index is missing and create_index_if_missing is disabled: {0:?}")]
    MissingIndex(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding error: {0}")]
    Embedding(String),
}
