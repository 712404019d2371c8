//! Database schema definitions
//!
//! Table and index names are validated identifiers and are substituted
//! directly into these templates. Everything else is bound as a parameter.

use crate::config::SimilarityMetric;

/// Columns in table order, as stored
pub const COLUMNS: &[&str] = &[
    "id",
    "embedding",
    "content",
    "blob_data",
    "blob_meta",
    "blob_mime_type",
    "meta",
];

/// SQL to create the documents table
pub fn create_table(table: &str, embedding_dim: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id VARCHAR(128) PRIMARY KEY,
    embedding FLOAT[{embedding_dim}],
    content TEXT,
    blob_data BLOB,
    blob_meta JSON,
    blob_mime_type VARCHAR(255),
    meta JSON
)
"#
    )
}

/// SQL to create the HNSW index over the embedding column
pub fn create_index(index: &str, table: &str, metric: SimilarityMetric) -> String {
    format!(
        "CREATE INDEX {index} ON {table} USING HNSW (embedding) WITH (metric = '{}')",
        metric.as_str()
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

pub fn drop_index(index: &str) -> String {
    format!("DROP INDEX IF EXISTS {index}")
}

pub const INDEX_EXISTS: &str = "SELECT COUNT(*) FROM duckdb_indexes() WHERE index_name = ?";

/// Upsert clause for `DuplicatePolicy::Overwrite`
pub const ON_CONFLICT_UPDATE: &str = r#"
ON CONFLICT (id) DO UPDATE SET
    embedding = EXCLUDED.embedding,
    content = EXCLUDED.content,
    blob_data = EXCLUDED.blob_data,
    blob_meta = EXCLUDED.blob_meta,
    blob_mime_type = EXCLUDED.blob_mime_type,
    meta = EXCLUDED.meta
"#;

pub const ON_CONFLICT_NOTHING: &str = "ON CONFLICT DO NOTHING";

/// Parameterized insert; vectors and JSON arrive as text and are cast here
pub fn insert(table: &str, embedding_dim: usize, conflict_clause: &str) -> String {
    format!(
        "INSERT INTO {table} (id, embedding, content, blob_data, blob_meta, blob_mime_type, meta) \
         VALUES (?, CAST(? AS FLOAT[{embedding_dim}]), ?, ?, CAST(? AS JSON), ?, CAST(? AS JSON)) \
         {conflict_clause}"
    )
}

/// Select list that reads every column back as text or bytes
pub const SELECT_COLUMNS: &str = "id, \
     CAST(to_json(embedding) AS VARCHAR), \
     content, \
     blob_data, \
     CAST(blob_meta AS VARCHAR), \
     blob_mime_type, \
     CAST(meta AS VARCHAR)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_uses_dimension() {
        let sql = create_table("docs", 384);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS docs"));
        assert!(sql.contains("FLOAT[384]"));
        for column in COLUMNS {
            assert!(sql.contains(column));
        }
    }

    #[test]
    fn test_create_index_metric() {
        let sql = create_index("idx", "docs", SimilarityMetric::Ip);
        assert_eq!(sql, "CREATE INDEX idx ON docs USING HNSW (embedding) WITH (metric = 'ip')");
    }

    #[test]
    fn test_insert_template() {
        let sql = insert("docs", 3, ON_CONFLICT_NOTHING);
        assert!(sql.starts_with("INSERT INTO docs"));
        assert!(sql.contains("FLOAT[3]"));
        assert!(sql.ends_with(ON_CONFLICT_NOTHING));
        assert_eq!(sql.matches('?').count(), COLUMNS.len());
    }
}
