//! Insert/filter timing harness
//!
//! Times the phases of a typical indexing round trip: build the fixture
//! documents, open the store, write them, run one filter query.

use std::time::{Duration, Instant};

use crate::config::StoreConfig;
use crate::filters::Filter;
use crate::fixtures;
use crate::storage::DuckDbDocumentStore;
use crate::store::{DocumentStore, DuplicatePolicy};
use crate::Result;

/// Named phase durations for one iteration, in execution order
#[derive(Debug, Clone, Default)]
pub struct Timings {
    pub phases: Vec<(&'static str, Duration)>,
}

impl Timings {
    fn record<T>(&mut self, phase: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let value = f()?;
        self.phases.push((phase, start.elapsed()));
        Ok(value)
    }

    pub fn get(&self, phase: &str) -> Option<Duration> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, d)| *d)
    }
}

impl std::fmt::Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .phases
            .iter()
            .map(|(phase, d)| format!("{}={}", phase, format_ms(*d)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

pub fn format_ms(d: Duration) -> String {
    format!("{:.1} ms", d.as_secs_f64() * 1000.0)
}

/// Query used for the filter phase
pub fn profile_filter() -> Filter {
    Filter::not(vec![
        Filter::eq("meta.number", 100),
        Filter::eq("meta.name", "name_0"),
    ])
}

/// One iteration. Opens a fresh store from `config` unless `reuse` is given.
pub fn run_once(reuse: Option<&DuckDbDocumentStore>, config: &StoreConfig) -> Result<Timings> {
    let mut timings = Timings::default();

    let docs = timings.record("create_docs", || Ok(fixtures::filterable_docs(config.embedding_dim)))?;

    let opened;
    let store = match reuse {
        Some(store) => store,
        None => {
            opened = timings.record("init_store", || DuckDbDocumentStore::open(config.clone()))?;
            &opened
        }
    };

    timings.record("write_documents", || store.write_documents(&docs, DuplicatePolicy::None))?;
    timings.record("filter_documents", || store.filter_documents(Some(&profile_filter())))?;

    Ok(timings)
}

/// Per-phase averages over several iterations, in first-seen phase order
pub fn average(runs: &[Timings]) -> Timings {
    let mut totals: Vec<(&'static str, Duration, u32)> = Vec::new();
    for run in runs {
        for (phase, d) in &run.phases {
            match totals.iter().position(|(p, _, _)| p == phase) {
                Some(i) => {
                    totals[i].1 += *d;
                    totals[i].2 += 1;
                }
                None => totals.push((*phase, *d, 1)),
            }
        }
    }
    Timings {
        phases: totals.into_iter().map(|(p, d, n)| (p, d / n)).collect(),
    }
}
