//! Document store protocol
//!
//! The fixed contract a storage backend implements to plug into a retrieval
//! pipeline. `DuckDbDocumentStore` is the implementation in this crate.

use crate::document::Document;
use crate::filters::Filter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do when a written document's id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Backend default; for DuckDB this keeps the existing row
    #[default]
    None,
    /// Keep the existing document and ignore the new one
    Skip,
    /// Replace the existing document
    Overwrite,
    /// Fail the whole write
    Fail,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::None => "none",
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Overwrite => "overwrite",
            DuplicatePolicy::Fail => "fail",
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(DuplicatePolicy::None),
            "skip" => Ok(DuplicatePolicy::Skip),
            "overwrite" => Ok(DuplicatePolicy::Overwrite),
            "fail" => Ok(DuplicatePolicy::Fail),
            _ => Err(Error::InvalidArgument(format!("Unknown duplicate policy: {}", s))),
        }
    }
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage backend contract.
pub trait DocumentStore: Send + Sync {
    /// Number of stored documents
    fn count_documents(&self) -> Result<usize>;

    /// Documents matching `filters`, or all documents when `None`
    fn filter_documents(&self, filters: Option<&Filter>) -> Result<Vec<Document>>;

    /// Write documents, returning how many rows were actually written.
    ///
    /// Fails with `Error::DuplicateDocument` under `DuplicatePolicy::Fail`
    /// when any id already exists.
    fn write_documents(&self, documents: &[Document], policy: DuplicatePolicy) -> Result<usize>;

    /// Delete documents by id. Unknown ids are ignored.
    fn delete_documents(&self, document_ids: &[String]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("SKIP".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Skip);
        assert_eq!("overwrite".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Overwrite);
        assert!("replace".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::None);
    }
}
