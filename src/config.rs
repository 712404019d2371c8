use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Distance used by the HNSW index and by embedding retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Squared euclidean distance
    L2sq,
    #[default]
    Cosine,
    /// Inner product
    Ip,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::L2sq => "l2sq",
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Ip => "ip",
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "l2sq" => Ok(SimilarityMetric::L2sq),
            "cosine" => Ok(SimilarityMetric::Cosine),
            "ip" => Ok(SimilarityMetric::Ip),
            _ => Err(Error::InvalidArgument(format!("Unknown similarity metric: {}", s))),
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store construction parameters. Also the `init_parameters` of `to_dict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path, or `:memory:`
    pub database: String,
    pub table: String,
    pub index: String,
    pub embedding_dim: usize,
    pub similarity_metric: SimilarityMetric,
    pub write_batch_size: usize,
    pub create_index_if_missing: bool,
    pub recreate_table: bool,
    pub recreate_index: bool,
    /// Load the `vss` extension and maintain an HNSW index
    pub hnsw_index: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: IN_MEMORY.to_string(),
            table: "haystack_documents".to_string(),
            index: "hnsw_idx_haystack_documents".to_string(),
            embedding_dim: 768,
            similarity_metric: SimilarityMetric::Cosine,
            write_batch_size: 100,
            create_index_if_missing: true,
            recreate_table: false,
            recreate_index: false,
            hnsw_index: true,
        }
    }
}

pub const IN_MEMORY: &str = ":memory:";

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }
}

/// Serialize a component as `{"type": ..., "init_parameters": ...}`
pub fn default_to_dict<T: Serialize>(type_name: &str, init_parameters: &T) -> Result<Value> {
    Ok(json!({
        "type": type_name,
        "init_parameters": serde_json::to_value(init_parameters)?,
    }))
}

/// Inverse of `default_to_dict`; rejects a dict of another type
pub fn default_from_dict<T: for<'de> Deserialize<'de>>(type_name: &str, data: &Value) -> Result<T> {
    let found = data.get("type").and_then(Value::as_str).unwrap_or_default();
    if found != type_name {
        return Err(Error::InvalidArgument(format!(
            "Cannot deserialize {:?} as {:?}",
            found, type_name
        )));
    }
    let params = data.get("init_parameters").cloned().unwrap_or_else(|| json!({}));
    Ok(serde_json::from_value(params)?)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("duckstore.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".duckstore").join("documents.duckdb")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
