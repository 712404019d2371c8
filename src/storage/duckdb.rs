//! DuckDB storage implementation

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use duckdb::types::Value as SqlValue;
use duckdb::{params, params_from_iter, Connection};
use serde_json::Value;

use super::convert::{self, DocumentRow};
use super::schema;
use super::sql_filter;
use crate::config::{self, SimilarityMetric, StoreConfig};
use crate::document::Document;
use crate::filters::Filter;
use crate::store::{DocumentStore, DuplicatePolicy};
use crate::{Error, Result};

/// Document store backed by a single DuckDB table with an HNSW vector index.
///
/// The connection is guarded by a mutex so one store can be shared across
/// threads (e.g. behind an `Arc` held by a retriever); statements still run
/// one at a time.
pub struct DuckDbDocumentStore {
    conn: Mutex<Connection>,
    config: StoreConfig,
}

impl DuckDbDocumentStore {
    /// Type tag used by `to_dict` / `from_dict`
    pub const TYPE_NAME: &'static str = "duckstore.storage.DuckDbDocumentStore";

    /// Open (or create) the database and make sure table and index exist
    pub fn open(config: StoreConfig) -> Result<Self> {
        convert::validate_name(&config.table)?;
        convert::validate_name(&config.index)?;
        if config.embedding_dim == 0 {
            return Err(Error::InvalidArgument("embedding_dim must be > 0".to_string()));
        }

        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            let path = Path::new(&config.database);
            config::ensure_db_dir(path)?;
            Connection::open(path)?
        };

        let store = Self {
            conn: Mutex::new(conn),
            config,
        };
        store.initialize_schema()?;

        tracing::info!(
            "Opened document store {:?} (table {:?}, {} dimensions, {})",
            store.config.database,
            store.config.table,
            store.config.embedding_dim,
            store.config.similarity_metric
        );
        Ok(store)
    }

    /// Open an in-memory store with default settings
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves the connection itself usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock_conn();
        let table = &self.config.table;

        if self.config.hnsw_index {
            tracing::debug!("Loading vss extension");
            conn.execute_batch("INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;")?;
        }

        if self.config.recreate_table {
            tracing::debug!("Dropping table {:?}", table);
            conn.execute_batch(&schema::drop_table(table))?;
        }

        tracing::debug!("Creating table {:?}", table);
        conn.execute_batch(&schema::create_table(table, self.config.embedding_dim))?;

        if self.config.hnsw_index {
            self.ensure_index(&conn)?;
        }
        Ok(())
    }

    fn ensure_index(&self, conn: &Connection) -> Result<()> {
        let index = &self.config.index;

        if self.config.recreate_index {
            tracing::debug!("Dropping index {:?}", index);
            conn.execute_batch(&schema::drop_index(index))?;
        } else if index_exists(conn, index)? {
            return Ok(());
        } else if !self.config.create_index_if_missing {
            return Err(Error::MissingIndex(index.clone()));
        }

        tracing::debug!("Creating index {:?} ({})", index, self.config.similarity_metric);
        conn.execute_batch(&schema::create_index(
            index,
            &self.config.table,
            self.config.similarity_metric,
        ))?;
        Ok(())
    }

    /// Whether the configured HNSW index is present
    pub fn has_index(&self) -> Result<bool> {
        index_exists(&self.lock_conn(), &self.config.index)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.config.embedding_dim {
            return Err(Error::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual,
            });
        }
        Ok(())
    }

    /// Nearest neighbours of `query_embedding` under the configured metric.
    ///
    /// Documents without an embedding never match. Each result carries a
    /// score: cosine similarity, inner product, or squared L2 distance.
    pub fn embedding_retrieval(
        &self,
        query_embedding: &[f32],
        filters: Option<&Filter>,
        top_k: usize,
    ) -> Result<Vec<Document>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be > 0".to_string()));
        }
        self.check_dimension(query_embedding.len())?;

        let query = serde_json::to_string(query_embedding)?;
        let distance = distance_expr(self.config.similarity_metric, self.config.embedding_dim);
        let score = score_expr(self.config.similarity_metric, &distance);

        let mut params = vec![SqlValue::Text(query.clone())];
        let mut sql = format!(
            "SELECT {}, CAST({} AS DOUBLE) AS score FROM {} WHERE embedding IS NOT NULL",
            schema::SELECT_COLUMNS,
            score,
            self.config.table
        );
        if let Some(filter) = filters {
            let clause = sql_filter::translate(filter)?;
            sql.push_str(" AND ");
            sql.push_str(&clause.sql);
            params.extend(clause.params);
        }
        sql.push_str(&format!(" ORDER BY {} LIMIT {}", distance, top_k));
        params.push(SqlValue::Text(query));

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), DocumentRow::from_scored_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;

        tracing::debug!("Embedding retrieval returned {} documents", rows.len());
        convert::to_documents(rows)
    }

    /// Serialize the store's construction parameters
    pub fn to_dict(&self) -> Result<Value> {
        config::default_to_dict(Self::TYPE_NAME, &self.config)
    }

    /// Re-open a store from `to_dict` output
    pub fn from_dict(data: &Value) -> Result<Self> {
        Self::open(config::default_from_dict(Self::TYPE_NAME, data)?)
    }

    /// Reject duplicates within the batch or against stored ids
    fn check_duplicates(&self, conn: &Connection, rows: &[DocumentRow]) -> Result<()> {
        let mut seen = HashSet::new();
        for row in rows {
            if !seen.insert(row.id.as_str()) {
                return Err(Error::DuplicateDocument(row.id.clone()));
            }
        }

        for chunk in rows.chunks(self.config.write_batch_size.max(1)) {
            let sql = format!(
                "SELECT id FROM {} WHERE id IN ({}) LIMIT 1",
                self.config.table,
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut found = stmt.query(params_from_iter(chunk.iter().map(|r| r.id.as_str())))?;
            if let Some(row) = found.next()? {
                let id: String = row.get(0)?;
                return Err(Error::DuplicateDocument(id));
            }
        }
        Ok(())
    }
}

impl DocumentStore for DuckDbDocumentStore {
    fn count_documents(&self) -> Result<usize> {
        let conn = self.lock_conn();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.config.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn filter_documents(&self, filters: Option<&Filter>) -> Result<Vec<Document>> {
        let mut sql = format!("SELECT {} FROM {}", schema::SELECT_COLUMNS, self.config.table);
        let mut params = Vec::new();
        if let Some(filter) = filters {
            let clause = sql_filter::translate(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause.sql);
            params = clause.params;
        }
        sql.push_str(" ORDER BY id");

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), DocumentRow::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;

        convert::to_documents(rows)
    }

    fn write_documents(&self, documents: &[Document], policy: DuplicatePolicy) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        for doc in documents {
            if let Some(embedding) = &doc.embedding {
                self.check_dimension(embedding.len())?;
            }
        }
        let rows = convert::to_rows(documents)?;

        let conflict_clause = match policy {
            DuplicatePolicy::None | DuplicatePolicy::Skip => schema::ON_CONFLICT_NOTHING,
            DuplicatePolicy::Overwrite => schema::ON_CONFLICT_UPDATE,
            DuplicatePolicy::Fail => "",
        };
        let sql = schema::insert(&self.config.table, self.config.embedding_dim, conflict_clause);

        let mut conn = self.lock_conn();
        // Dropping the transaction without commit rolls it back
        let tx = conn.transaction()?;
        if policy == DuplicatePolicy::Fail {
            self.check_duplicates(&tx, &rows)?;
        }

        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &rows {
                written += stmt
                    .execute(params![
                        row.id,
                        row.embedding,
                        row.content,
                        row.blob_data,
                        row.blob_meta,
                        row.blob_mime_type,
                        row.meta,
                    ])
                    .map_err(|e| map_write_error(e, &row.id))?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Wrote {}/{} documents to {:?} (policy: {})",
            written,
            rows.len(),
            self.config.table,
            policy
        );
        Ok(written)
    }

    fn delete_documents(&self, document_ids: &[String]) -> Result<()> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let conn = self.lock_conn();
        let mut deleted = 0;
        for chunk in document_ids.chunks(self.config.write_batch_size.max(1)) {
            let sql = format!(
                "DELETE FROM {} WHERE id IN ({})",
                self.config.table,
                placeholders(chunk.len())
            );
            deleted += conn.execute(&sql, params_from_iter(chunk.iter()))?;
        }

        tracing::debug!("Deleted {} of {} requested documents", deleted, document_ids.len());
        Ok(())
    }
}

fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    let count: i64 = conn.query_row(schema::INDEX_EXISTS, [index], |row| row.get(0))?;
    Ok(count > 0)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Distance expression the HNSW index can serve; smaller is closer
fn distance_expr(metric: SimilarityMetric, dim: usize) -> String {
    let function = match metric {
        SimilarityMetric::Cosine => "array_cosine_distance",
        SimilarityMetric::Ip => "array_negative_inner_product",
        SimilarityMetric::L2sq => "array_distance",
    };
    format!("{}(embedding, CAST(? AS FLOAT[{}]))", function, dim)
}

fn score_expr(metric: SimilarityMetric, distance: &str) -> String {
    match metric {
        SimilarityMetric::Cosine => format!("1 - {}", distance),
        SimilarityMetric::Ip => format!("-{}", distance),
        SimilarityMetric::L2sq => format!("pow({}, 2)", distance),
    }
}

/// Map a primary-key violation to `DuplicateDocument`.
///
/// DuckDB reports every failure through the C API with the same error code,
/// so the violation is recognised by its message prefix ("Constraint Error").
/// That text is engine output, not a stable API.
fn map_write_error(err: duckdb::Error, id: &str) -> Error {
    match &err {
        duckdb::Error::DuckDBFailure(_, Some(message)) if message.contains("Constraint Error") => {
            Error::DuplicateDocument(id.to_string())
        }
        _ => Error::Storage(err),
    }
}
