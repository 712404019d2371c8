use crate::document::Document;
use crate::{Error, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// Output dimension of the bundled model (all-MiniLM-L6-v2)
pub const EMBEDDING_DIM: usize = 384;

/// Engine for generating text embeddings using local transformer models
pub struct EmbeddingEngine {
    model: TextEmbedding,
}

impl EmbeddingEngine {
    /// Create a new embedding engine with the default model
    pub fn new() -> Result<Self> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self { model })
    }

    pub fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Fill in embeddings for documents that have text content but no vector.
    ///
    /// Returns how many documents were embedded.
    pub fn embed_documents(&self, documents: &mut [Document]) -> Result<usize> {
        let pending: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.embedding.is_none() && d.content.as_deref().is_some_and(|c| !c.is_empty()))
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let inputs: Vec<String> = pending
            .iter()
            .filter_map(|&i| documents[i].content.clone())
            .collect();

        let embeddings = self
            .model
            .embed(inputs, None)
            .map_err(|e| Error::Embedding(format!("Embedding generation failed: {}", e)))?;

        for (&i, vector) in pending.iter().zip(embeddings) {
            documents[i].embedding = Some(vector);
        }
        Ok(pending.len())
    }

    /// Generate a single embedding for a query
    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .model
            .embed(vec![query.to_string()], None)
            .map_err(|e| Error::Embedding(format!("Query embedding failed: {}", e)))?;

        if embeddings.is_empty() {
            return Err(Error::Embedding("Model returned no embedding".to_string()));
        }
        Ok(embeddings.remove(0))
    }
}
