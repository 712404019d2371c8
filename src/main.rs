//! duckstore CLI - manage and query a DuckDB document store

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use duckstore::config::{self, StoreConfig};
use duckstore::embedding::EmbeddingEngine;
use duckstore::ui::{self, Icons, Spinner};
use duckstore::{
    Document, DocumentStore, DuckDbDocumentStore, DuckDbEmbeddingRetriever, DuplicatePolicy, Filter,
    FilterPolicy, SimilarityMetric,
};
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "duckstore")]
#[command(version)]
#[command(about = "DuckDB document store with HNSW vector search")]
#[command(long_about = r#"
duckstore keeps retrieval documents in an embedded DuckDB table and lets you:
  • Write documents from JSON Lines, optionally embedding them locally
  • Filter by metadata with framework-style filter dictionaries
  • Search by vector similarity (cosine, inner product, squared L2)

Example usage:
  duckstore init --embedding-dim 384
  duckstore write --input docs.jsonl --embed
  duckstore filter --filters '{"field": "meta.genre", "operator": "==", "value": "economy"}'
  duckstore search --query "interest rates" --top-k 5
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./duckstore.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, or :memory:
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Table name
    #[arg(short, long, global = true)]
    table: Option<String>,

    /// Skip the vss extension and HNSW index (exact search only)
    #[arg(long, global = true)]
    no_hnsw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the table
    Init {
        /// Embedding dimension of the vector column
        #[arg(long, default_value = "768")]
        embedding_dim: usize,

        /// Similarity metric (cosine, ip, l2sq)
        #[arg(long, default_value = "cosine")]
        metric: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Write documents from a JSON Lines file
    Write {
        /// One JSON document per line
        #[arg(short, long)]
        input: PathBuf,

        /// Duplicate policy (none, skip, overwrite, fail)
        #[arg(short, long, default_value = "none")]
        policy: String,

        /// Embed document content locally before writing
        #[arg(long)]
        embed: bool,
    },

    /// List documents matching a filter
    Filter {
        /// Filter dictionary as JSON
        #[arg(short, long)]
        filters: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Count stored documents
    Count,

    /// Delete documents by id
    Delete {
        /// Document ids
        #[arg(long = "id", required = true)]
        ids: Vec<String>,
    },

    /// Nearest-neighbour search
    Search {
        /// Query embedding as a JSON array
        #[arg(short, long, conflicts_with = "query")]
        embedding: Option<String>,

        /// Query text, embedded locally
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Filter dictionary as JSON
        #[arg(short, long)]
        filters: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show store statistics
    Stats,

    /// Time document creation, store init, writes and filtering
    Profile {
        /// Number of iterations to run
        #[arg(short = 'n', long, default_value = "3")]
        iterations: usize,

        /// Reuse a single store across iterations
        #[arg(long)]
        reuse_store: bool,

        /// Disable table/index recreation on init
        #[arg(long)]
        no_recreate: bool,
    },
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut store_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    if let Some(database) = &cli.database {
        store_config.database = database.clone();
    }
    if let Some(table) = &cli.table {
        store_config.table = table.clone();
    }
    if cli.no_hnsw {
        store_config.hnsw_index = false;
    }
    Ok(store_config)
}

fn parse_filters(raw: Option<&str>) -> anyhow::Result<Option<Filter>> {
    Ok(raw.map(str::parse::<Filter>).transpose()?)
}

fn read_documents(path: &PathBuf) -> anyhow::Result<Vec<Document>> {
    let file = std::fs::File::open(path)?;
    let mut documents = Vec::new();
    for (lineno, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line)
            .map_err(|e| anyhow::anyhow!("{}:{}: {}", path.display(), lineno + 1, e))?;
        documents.push(doc);
    }
    Ok(documents)
}

/// Hash ids cover the embedding, so call this after `--embed` has run
fn assign_missing_ids(documents: &mut [Document]) {
    for doc in documents {
        doc.ensure_id();
    }
}

/// Write in `write_batch_size` chunks for progress reporting.
///
/// `Fail` must reject the whole input, so it goes through a single write.
fn write_in_batches(
    store: &DuckDbDocumentStore,
    documents: &[Document],
    policy: DuplicatePolicy,
    mut progress: impl FnMut(usize),
) -> duckstore::Result<usize> {
    if policy == DuplicatePolicy::Fail {
        let written = store.write_documents(documents, policy)?;
        progress(documents.len());
        return Ok(written);
    }

    let mut written = 0;
    let mut done = 0;
    for batch in documents.chunks(store.config().write_batch_size.max(1)) {
        written += store.write_documents(batch, policy)?;
        done += batch.len();
        progress(done);
    }
    Ok(written)
}

fn print_documents(documents: &[Document], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(documents)?);
    } else if documents.is_empty() {
        println!("{} No documents found.", Icons::CROSS);
    } else {
        println!("{}", ui::documents_table(documents));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store_config = resolve_config(&cli)?;

    match cli.command {
        Commands::Init { embedding_dim, ref metric, force } => {
            let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
            let mut store_config = store_config;
            if cli.database.is_none() && store_config.is_in_memory() {
                store_config.database = config::default_database_path_in(&std::env::current_dir()?)
                    .display()
                    .to_string();
            }
            store_config.embedding_dim = embedding_dim;
            store_config.similarity_metric = metric.parse::<SimilarityMetric>()?;

            config::write_config(&config_path, &store_config, force)?;
            let store = DuckDbDocumentStore::open(store_config)?;

            ui::success(&format!("Wrote config to {}", config_path.display()));
            ui::info("Database", &store.config().database);
            ui::info("Table", &store.config().table);
        }

        Commands::Write { ref input, ref policy, embed } => {
            let policy: DuplicatePolicy = policy.parse()?;
            let mut documents = read_documents(input)?;
            let store = DuckDbDocumentStore::open(store_config)?;

            if embed {
                let engine = EmbeddingEngine::new()?;
                if engine.dimension() != store.config().embedding_dim {
                    anyhow::bail!(
                        "embedding model produces {} dimensions but the store expects {}",
                        engine.dimension(),
                        store.config().embedding_dim
                    );
                }
                let spinner = Spinner::new("Embedding documents");
                let embedded = engine.embed_documents(&mut documents)?;
                spinner.finish_with_message(&format!("Embedded {} documents", embedded));
            }

            assign_missing_ids(&mut documents);

            let started = Instant::now();
            let spinner = Spinner::new("Writing documents");
            let written = write_in_batches(&store, &documents, policy, |done| {
                spinner.set_message(&format!("Writing documents ({}/{})", done, documents.len()));
            })?;
            spinner.finish_and_clear();

            ui::success(&format!("Wrote {} of {} documents (policy: {})", written, documents.len(), policy));
            if written < documents.len() {
                ui::warn(&format!("{} documents already existed and were skipped", documents.len() - written));
            }
            ui::timing(&duckstore::profile::format_ms(started.elapsed()));
        }

        Commands::Filter { ref filters, ref format } => {
            let filters = parse_filters(filters.as_deref())?;
            let store = DuckDbDocumentStore::open(store_config)?;
            let documents = store.filter_documents(filters.as_ref())?;
            print_documents(&documents, format)?;
        }

        Commands::Count => {
            let store = DuckDbDocumentStore::open(store_config)?;
            println!("{}", store.count_documents()?);
        }

        Commands::Delete { ref ids } => {
            let store = DuckDbDocumentStore::open(store_config)?;
            let before = store.count_documents()?;
            store.delete_documents(ids)?;
            let removed = before - store.count_documents()?;
            println!("{} Deleted {} of {} documents", Icons::DEL, removed, ids.len());
        }

        Commands::Search { ref embedding, ref query, top_k, ref filters, ref format } => {
            let filters = parse_filters(filters.as_deref())?;
            let query_embedding: Vec<f32> = match (embedding, query) {
                (Some(raw), _) => serde_json::from_str(raw)?,
                (None, Some(text)) => {
                    println!("{} Embedding query: '{}'", Icons::BRAIN, text);
                    EmbeddingEngine::new()?.embed_query(text)?
                }
                (None, None) => anyhow::bail!("either --embedding or --query is required"),
            };

            let store = Arc::new(DuckDbDocumentStore::open(store_config)?);
            let retriever = DuckDbEmbeddingRetriever::new(store, None, top_k, FilterPolicy::Replace)?;
            let output = retriever.run(&query_embedding, filters.as_ref(), None)?;
            print_documents(&output.documents, format)?;
        }

        Commands::Stats => {
            let store = DuckDbDocumentStore::open(store_config)?;
            let cfg = store.config();
            let count = store.count_documents()?.to_string();
            let dim = cfg.embedding_dim.to_string();
            let metric = cfg.similarity_metric.to_string();
            let index = if cfg.hnsw_index && store.has_index()? {
                cfg.index.clone()
            } else {
                "none".to_string()
            };

            println!("{} duckstore statistics ({})", Icons::STATS, cfg.database);
            println!(
                "{}",
                ui::stats_table(&[
                    ("Table", cfg.table.as_str()),
                    ("Documents", count.as_str()),
                    ("Embedding dim", dim.as_str()),
                    ("Metric", metric.as_str()),
                    ("HNSW index", index.as_str()),
                ])
            );
        }

        Commands::Profile { iterations, reuse_store, no_recreate } => {
            if iterations == 0 {
                anyhow::bail!("--iterations must be at least 1");
            }
            let profile_config = StoreConfig {
                table: cli.table.clone().unwrap_or_else(|| "documents".to_string()),
                recreate_table: !no_recreate,
                recreate_index: !no_recreate,
                ..store_config
            };

            ui::header(&format!("Profiling {} ({} iterations)", profile_config.database, iterations));
            let shared = if reuse_store {
                Some(DuckDbDocumentStore::open(profile_config.clone())?)
            } else {
                None
            };

            let mut runs = Vec::with_capacity(iterations);
            for i in 0..iterations {
                let timings = duckstore::profile::run_once(shared.as_ref(), &profile_config)?;
                println!("iter {}: {}", (i + 1).style(ui::theme().highlight.clone()), timings);
                runs.push(timings);
            }

            let avg = duckstore::profile::average(&runs);
            ui::section(&format!(" average over {} iterations ", iterations));
            for (phase, elapsed) in &avg.phases {
                ui::summary_row(phase, &duckstore::profile::format_ms(*elapsed));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DuckDbDocumentStore {
        DuckDbDocumentStore::open(StoreConfig {
            table: "cli_docs".to_string(),
            embedding_dim: 2,
            write_batch_size: 2,
            hnsw_index: false,
            ..Default::default()
        })
        .unwrap()
    }

    fn batch(ids: &[&str]) -> Vec<Document> {
        ids.iter()
            .map(|id| Document::from_content(format!("doc {}", id)).with_id(*id))
            .collect()
    }

    #[test]
    fn test_fail_policy_writes_nothing_across_batches() {
        let store = store();
        store.write_documents(&batch(&["e"]), DuplicatePolicy::None).unwrap();

        // The clash sits in the third chunk of two
        let documents = batch(&["a", "b", "c", "d", "e"]);
        let mut reported = Vec::new();
        let err = write_in_batches(&store, &documents, DuplicatePolicy::Fail, |done| reported.push(done))
            .unwrap_err();
        assert!(matches!(err, duckstore::Error::DuplicateDocument(ref id) if id == "e"));
        assert_eq!(store.count_documents().unwrap(), 1);
        assert!(reported.is_empty());
    }

    #[test]
    fn test_skip_policy_reports_each_batch() {
        let store = store();
        store.write_documents(&batch(&["e"]), DuplicatePolicy::None).unwrap();

        let documents = batch(&["a", "b", "c", "d", "e"]);
        let mut reported = Vec::new();
        let written = write_in_batches(&store, &documents, DuplicatePolicy::Skip, |done| reported.push(done)).unwrap();
        assert_eq!(written, 4);
        assert_eq!(reported, vec![2, 4, 5]);
        assert_eq!(store.count_documents().unwrap(), 5);
    }

    #[test]
    fn test_ids_assigned_after_embedding_cover_it() {
        let mut documents: Vec<Document> =
            serde_json::from_str(r#"[{"content": "hello"}, {"id": "fixed", "content": "x"}]"#).unwrap();
        documents[0].embedding = Some(vec![0.5, 0.25]);
        assign_missing_ids(&mut documents);

        assert_eq!(documents[0].id, Document::from_content("hello").with_embedding(vec![0.5, 0.25]).id);
        assert_ne!(documents[0].id, Document::from_content("hello").id);
        assert_eq!(documents[1].id, "fixed");
    }
}
