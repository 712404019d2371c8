//! Storage Layer - DuckDB-backed persistence
//!
//! A single flat table per store:
//! - documents(id, embedding FLOAT[n], content, blob_data, blob_meta, blob_mime_type, meta)
//!
//! plus an optional HNSW index over `embedding` provided by the `vss` extension.

pub mod schema;
pub mod convert;
pub mod sql_filter;
pub mod duckdb;

pub use self::convert::{to_documents, to_rows, validate_name, DocumentRow};
pub use self::duckdb::DuckDbDocumentStore;
