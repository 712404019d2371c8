//! Document <-> row mapping

use crate::document::{ByteStream, Document};
use crate::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// Longest identifier accepted for tables and indexes
const MAX_IDENTIFIER_LEN: usize = 63;

/// Check that a table or index name is a plain SQL identifier
pub fn validate_name(name: &str) -> Result<()> {
    let re = IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    });
    if name.len() > MAX_IDENTIFIER_LEN || !re.is_match(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// One row of the documents table, in bind/fetch form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentRow {
    pub id: String,
    /// JSON array text, cast to `FLOAT[n]` by the engine
    pub embedding: Option<String>,
    pub content: Option<String>,
    pub blob_data: Option<Vec<u8>>,
    pub blob_meta: Option<String>,
    pub blob_mime_type: Option<String>,
    pub meta: Option<String>,
    /// Only populated by similarity queries
    pub score: Option<f64>,
}

impl DocumentRow {
    pub fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            embedding: row.get(1)?,
            content: row.get(2)?,
            blob_data: row.get(3)?,
            blob_meta: row.get(4)?,
            blob_mime_type: row.get(5)?,
            meta: row.get(6)?,
            score: None,
        })
    }

    /// Like `from_row`, with the score in the column after `meta`
    pub fn from_scored_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        let mut doc = Self::from_row(row)?;
        doc.score = row.get(7)?;
        Ok(doc)
    }
}

/// Convert documents into rows ready to bind.
///
/// Scores are dropped. Sparse embeddings are not stored and are logged.
pub fn to_rows(documents: &[Document]) -> Result<Vec<DocumentRow>> {
    documents.iter().map(to_row).collect()
}

fn to_row(document: &Document) -> Result<DocumentRow> {
    if document.sparse_embedding.is_some() {
        tracing::warn!(
            "Document {} has the `sparse_embedding` field set, but storing sparse embeddings \
             in DuckDB is not supported. The field will be ignored.",
            document.id
        );
    }

    let blob = document.blob.as_ref();
    let blob_meta = match blob {
        Some(b) if !b.meta.is_empty() => Some(Value::Object(b.meta.clone()).to_string()),
        _ => None,
    };

    Ok(DocumentRow {
        id: document.id.clone(),
        embedding: document.embedding.as_ref().map(serde_json::to_string).transpose()?,
        content: document.content.clone(),
        blob_data: blob.map(|b| b.data.clone()),
        blob_meta,
        blob_mime_type: blob.and_then(|b| b.mime_type.clone()),
        meta: Some(Value::Object(document.meta.clone()).to_string()),
        score: None,
    })
}

/// Convert fetched rows back into documents
pub fn to_documents(rows: Vec<DocumentRow>) -> Result<Vec<Document>> {
    rows.into_iter().map(to_document).collect()
}

fn to_document(row: DocumentRow) -> Result<Document> {
    let embedding = row
        .embedding
        .as_deref()
        .map(serde_json::from_str::<Vec<f32>>)
        .transpose()?;

    let meta = parse_object(row.meta.as_deref())?;

    let blob = match row.blob_data {
        Some(data) => Some(ByteStream {
            data,
            meta: parse_object(row.blob_meta.as_deref())?,
            mime_type: row.blob_mime_type,
        }),
        None => None,
    };

    Ok(Document {
        id: row.id,
        content: row.content,
        blob,
        meta,
        score: row.score,
        embedding,
        sparse_embedding: None,
    })
}

fn parse_object(text: Option<&str>) -> Result<Map<String, Value>> {
    match text {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str(text)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(Error::InvalidArgument(format!("Expected a JSON object, found {}", other))),
        },
    }
}
