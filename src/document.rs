//! Document types - the unit of storage and retrieval
//!
//! A `Document` carries text content and/or a binary blob, free-form JSON
//! metadata, and an optional dense embedding. Ids default to a content hash
//! so the same document always lands on the same row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Binary payload attached to a document (images, PDFs, audio, ...)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ByteStream {
    pub data: Vec<u8>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ByteStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            meta: Map::new(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Sparse vector as parallel index/value arrays.
///
/// Accepted on documents for compatibility but never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseEmbedding {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A retrievable document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier; a content hash unless set explicitly
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub blob: Option<ByteStream>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Relevance score, only set on retrieval results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_embedding: Option<SparseEmbedding>,
}

impl Document {
    /// Create a text document. The id is derived from the content.
    pub fn from_content(content: impl Into<String>) -> Self {
        let mut doc = Self {
            content: Some(content.into()),
            ..Default::default()
        };
        doc.id = doc.content_hash();
        doc
    }

    /// Create a blob-only document. The id is derived from the blob.
    pub fn from_blob(blob: ByteStream) -> Self {
        let mut doc = Self {
            blob: Some(blob),
            ..Default::default()
        };
        doc.id = doc.content_hash();
        doc
    }

    /// Add a metadata entry and re-derive the id.
    ///
    /// Call `with_id` last to keep an explicit id.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self.id = self.content_hash();
        self
    }

    /// Attach a dense embedding and re-derive the id.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self.id = self.content_hash();
        self
    }

    /// Attach a blob and re-derive the id.
    pub fn with_blob(mut self, blob: ByteStream) -> Self {
        self.blob = Some(blob);
        self.id = self.content_hash();
        self
    }

    pub fn with_sparse_embedding(mut self, sparse: SparseEmbedding) -> Self {
        self.sparse_embedding = Some(sparse);
        self
    }

    /// Override the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Fill in a hash id when none was provided (e.g. after deserializing).
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = self.content_hash();
        }
    }

    /// Stable hex digest over content, blob, meta and embedding.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.content.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\x1f");
        if let Some(blob) = &self.blob {
            hasher.update(&blob.data);
            hasher.update(b"\x1f");
            hasher.update(blob.mime_type.as_deref().unwrap_or("").as_bytes());
        }
        hasher.update(b"\x1f");
        hasher.update(Value::Object(self.meta.clone()).to_string().as_bytes());
        hasher.update(b"\x1f");
        if let Some(embedding) = &self.embedding {
            for x in embedding {
                hasher.update(&x.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document(id={}", self.id)?;
        if let Some(content) = &self.content {
            let preview: String = content.chars().take(60).collect();
            write!(f, ", content={:?}", preview)?;
        }
        if let Some(blob) = &self.blob {
            write!(f, ", blob={} bytes", blob.data.len())?;
        }
        if !self.meta.is_empty() {
            write!(f, ", meta={}", Value::Object(self.meta.clone()))?;
        }
        if let Some(score) = self.score {
            write!(f, ", score={:.4}", score)?;
        }
        if let Some(embedding) = &self.embedding {
            write!(f, ", embedding=vector of size {}", embedding.len())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_is_deterministic() {
        let a = Document::from_content("hello").with_meta("lang", "en");
        let b = Document::from_content("hello").with_meta("lang", "en");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_id_changes_with_fields() {
        let base = Document::from_content("hello");
        let with_meta = Document::from_content("hello").with_meta("lang", "en");
        let with_embedding = Document::from_content("hello").with_embedding(vec![0.1, 0.2]);
        assert_ne!(base.id, with_meta.id);
        assert_ne!(base.id, with_embedding.id);
        assert_ne!(base.id, Document::from_content("world").id);
    }

    #[test]
    fn test_explicit_id_survives() {
        let doc = Document::from_content("hello").with_meta("k", 1).with_id("doc-1");
        assert_eq!(doc.id, "doc-1");
    }

    #[test]
    fn test_deserialize_without_id() {
        let mut doc: Document =
            serde_json::from_value(json!({"content": "from jsonl", "meta": {"page": 3}})).unwrap();
        assert!(doc.id.is_empty());
        doc.ensure_id();
        assert_eq!(doc.id, Document::from_content("from jsonl").with_meta("page", 3).id);
    }

    #[test]
    fn test_display() {
        let doc = Document::from_content("abc").with_embedding(vec![0.0; 4]).with_id("1");
        let shown = doc.to_string();
        assert!(shown.contains("id=1"));
        assert!(shown.contains("vector of size 4"));
    }
}
