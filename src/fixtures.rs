//! Deterministic document set for filter tests and profiling
//!
//! Mirrors the shape of the retrieval framework's conformance fixtures:
//! several chapters with numeric, string and date metadata, some documents
//! without embeddings.

use crate::document::Document;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Build the filterable fixture set (15 documents, 9 with random embeddings)
pub fn filterable_docs(embedding_dim: usize) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut documents = Vec::new();

    for i in 0..3 {
        let name = format!("name_{}", i);

        documents.push(
            Document::from_content(format!("A Foo Document {}", i))
                .with_meta("name", name.clone())
                .with_meta("page", "100")
                .with_meta("chapter", "intro")
                .with_meta("number", 2)
                .with_meta("date", "1969-07-21T20:17:40")
                .with_embedding(random_embedding(&mut rng, embedding_dim)),
        );
        documents.push(
            Document::from_content(format!("A Bar Document {}", i))
                .with_meta("name", name.clone())
                .with_meta("page", "123")
                .with_meta("chapter", "abstract")
                .with_meta("number", -2)
                .with_meta("date", "1972-12-11T19:54:58")
                .with_embedding(random_embedding(&mut rng, embedding_dim)),
        );
        documents.push(
            Document::from_content(format!("A Foobar Document {}", i))
                .with_meta("name", name.clone())
                .with_meta("page", "90")
                .with_meta("chapter", "conclusion")
                .with_meta("number", -10)
                .with_meta("date", "1989-11-09T17:53:00")
                .with_embedding(random_embedding(&mut rng, embedding_dim)),
        );
        documents.push(
            Document::from_content(format!("Document {} without embedding", i))
                .with_meta("name", name)
                .with_meta("no_embedding", true)
                .with_meta("chapter", "conclusion"),
        );
        documents.push(
            Document::from_content(format!("Doc {} with ones emb", i))
                .with_meta("name", "ones_doc")
                .with_meta("tags", json!(["ones", format!("copy_{}", i)]))
                .with_embedding(vec![1.0; embedding_dim]),
        );
    }

    documents
}

fn random_embedding(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect()
}
