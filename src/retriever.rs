//! Embedding retriever
//!
//! Wraps a shared `DuckDbDocumentStore` with default filters and `top_k`,
//! the way a retrieval pipeline component is configured once and then run
//! per query.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config;
use crate::document::Document;
use crate::filters::{Filter, FilterPolicy};
use crate::storage::DuckDbDocumentStore;
use crate::{Error, Result};

/// Documents returned by one retriever run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieverOutput {
    pub documents: Vec<Document>,
}

/// Retrieves the documents closest to a query embedding
pub struct DuckDbEmbeddingRetriever {
    document_store: Arc<DuckDbDocumentStore>,
    filters: Option<Filter>,
    top_k: usize,
    filter_policy: FilterPolicy,
}

/// Serializable part of the retriever's configuration
#[derive(Debug, Serialize, Deserialize)]
struct RetrieverParams {
    document_store: Value,
    #[serde(default)]
    filters: Option<Filter>,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    filter_policy: FilterPolicy,
}

fn default_top_k() -> usize {
    10
}

impl DuckDbEmbeddingRetriever {
    pub const TYPE_NAME: &'static str = "duckstore.retriever.DuckDbEmbeddingRetriever";

    /// Create a retriever; `top_k` must be greater than zero
    pub fn new(
        document_store: Arc<DuckDbDocumentStore>,
        filters: Option<Filter>,
        top_k: usize,
        filter_policy: FilterPolicy,
    ) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::InvalidArgument(format!("top_k must be > 0, got {}", top_k)));
        }
        Ok(Self {
            document_store,
            filters,
            top_k,
            filter_policy,
        })
    }

    /// Retriever with no default filters and `top_k = 10`
    pub fn with_defaults(document_store: Arc<DuckDbDocumentStore>) -> Self {
        Self {
            document_store,
            filters: None,
            top_k: default_top_k(),
            filter_policy: FilterPolicy::default(),
        }
    }

    pub fn document_store(&self) -> &Arc<DuckDbDocumentStore> {
        &self.document_store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run one query.
    ///
    /// Runtime `filters` combine with the init filters according to the
    /// filter policy; a runtime `top_k` overrides the init value.
    pub fn run(
        &self,
        query_embedding: &[f32],
        filters: Option<&Filter>,
        top_k: Option<usize>,
    ) -> Result<RetrieverOutput> {
        let filters = self.filter_policy.apply(self.filters.as_ref(), filters);
        let top_k = top_k.unwrap_or(self.top_k);

        let documents = self
            .document_store
            .embedding_retrieval(query_embedding, filters.as_ref(), top_k)?;
        Ok(RetrieverOutput { documents })
    }

    pub fn to_dict(&self) -> Result<Value> {
        let params = RetrieverParams {
            document_store: self.document_store.to_dict()?,
            filters: self.filters.clone(),
            top_k: self.top_k,
            filter_policy: self.filter_policy,
        };
        config::default_to_dict(Self::TYPE_NAME, &params)
    }

    /// Rebuild a retriever, opening a fresh store from the embedded store dict
    pub fn from_dict(data: &Value) -> Result<Self> {
        let params: RetrieverParams = config::default_from_dict(Self::TYPE_NAME, data)?;
        let store = DuckDbDocumentStore::from_dict(&params.document_store)?;
        Self::new(Arc::new(store), params.filters, params.top_k, params.filter_policy)
    }
}

impl std::fmt::Debug for DuckDbEmbeddingRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbEmbeddingRetriever")
            .field("table", &self.document_store.config().table)
            .field("filters", &self.filters.as_ref().map(Filter::to_json).unwrap_or(json!(null)))
            .field("top_k", &self.top_k)
            .field("filter_policy", &self.filter_policy)
            .finish()
    }
}
