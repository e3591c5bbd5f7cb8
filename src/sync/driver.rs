//! Aggregation driver: runs a single sync pass.
//!
//! Only two things can fail a pass: reading the registry and writing it
//! back. Everything in between (candidate files, upstream calls) is
//! isolated per entry and folded into that entry's record.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::adapters::indexer::IndexerAdapter;
use crate::adapters::masp::MaspIndexerAdapter;
use crate::adapters::range::RangeIndexerAdapter;
use crate::adapters::rpc::RpcAdapter;
use crate::adapters::snapshot::SnapshotAdapter;
use crate::adapters::StatusAdapter;
use crate::config::SyncConfig;
use crate::fetcher::Fetcher;
use crate::registry::candidates::{load_candidates, CandidateSource};
use crate::registry::reconcile::merge;
use crate::registry::{Category, Endpoint, Registry};

/// Per-category outcome of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: Category,
    pub total: usize,
    pub reachable: usize,
    /// Records appended from the community registry this pass.
    pub added: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub categories: Vec<CategoryOutcome>,
}

impl PassSummary {
    pub fn get(&self, category: Category) -> Option<&CategoryOutcome> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.total).sum()
    }

    pub fn reachable(&self) -> usize {
        self.categories.iter().map(|c| c.reachable).sum()
    }
}

/// Run one pass against `config.registry`. `now` is the pass-start Unix
/// time stamped into every `last_check`.
pub async fn run_pass(config: &SyncConfig, fetcher: Arc<dyn Fetcher>, now: i64) -> Result<PassSummary> {
    let mut registry = Registry::load(&config.registry)?;
    let started = std::time::Instant::now();
    let sources = &config.sources;
    let root = config.external_dir.as_path();
    let concurrency = config.concurrency();

    // 1. Community candidates
    let (rpc, rpc_added) = absorb(&registry.rpc, sources.rpc.as_ref(), root, Category::Rpc);
    let (indexers, indexers_added) =
        absorb(&registry.indexers, sources.indexers.as_ref(), root, Category::Indexers);
    let (masp, masp_added) =
        absorb(&registry.masp_indexers, sources.masp_indexers.as_ref(), root, Category::MaspIndexers);
    let (range, range_added) =
        absorb(&registry.range_indexers, sources.range_indexers.as_ref(), root, Category::RangeIndexers);

    // 2. Live status
    let mut summary = PassSummary::default();

    let (rpc, outcome) = refresh_all(Arc::new(RpcAdapter), rpc, &fetcher, now, concurrency).await;
    summary.categories.push(CategoryOutcome { added: rpc_added, ..outcome });
    registry.rpc = rpc;

    let (indexers, outcome) = refresh_all(Arc::new(IndexerAdapter), indexers, &fetcher, now, concurrency).await;
    summary.categories.push(CategoryOutcome { added: indexers_added, ..outcome });
    registry.indexers = indexers;

    let (masp, outcome) = refresh_all(Arc::new(MaspIndexerAdapter), masp, &fetcher, now, concurrency).await;
    summary.categories.push(CategoryOutcome { added: masp_added, ..outcome });
    registry.masp_indexers = masp;

    let (range, outcome) = refresh_all(Arc::new(RangeIndexerAdapter), range, &fetcher, now, concurrency).await;
    summary.categories.push(CategoryOutcome { added: range_added, ..outcome });
    registry.range_indexers = range;

    let snapshot_adapter = Arc::new(SnapshotAdapter::new(config.snapshots.clone()));
    let snapshots = std::mem::take(&mut registry.snapshots);
    let (snapshots, outcome) = refresh_all(snapshot_adapter, snapshots, &fetcher, now, concurrency).await;
    summary.categories.push(outcome);
    registry.snapshots = snapshots;

    // 3. Persist
    registry.save(&config.registry)?;

    for outcome in &summary.categories {
        info!(
            category = %outcome.category,
            total = outcome.total,
            reachable = outcome.reachable,
            unreachable = outcome.total - outcome.reachable,
            added = outcome.added,
            "Category refreshed"
        );
    }
    info!(
        total = summary.total(),
        reachable = summary.reachable(),
        duration_secs = started.elapsed().as_secs(),
        "📡 Sync pass complete"
    );

    Ok(summary)
}

/// Merge a category's community candidates, if it has a source.
fn absorb<E: Endpoint>(
    entries: &[E],
    source: Option<&CandidateSource>,
    root: &Path,
    category: Category,
) -> (Vec<E>, usize) {
    let Some(source) = source else {
        return (entries.to_vec(), 0);
    };

    let candidates = load_candidates(root, source);
    let (merged, stats) = merge(entries, &candidates);
    if !candidates.is_empty() {
        info!(
            category = %category,
            candidates = candidates.len(),
            matched = stats.matched,
            added = stats.added,
            "Community candidates merged"
        );
    }
    (merged, stats.added)
}

/// Refresh every record of one category with at most `concurrency`
/// probes in flight. The result is in input order.
async fn refresh_all<A: StatusAdapter>(
    adapter: Arc<A>,
    records: Vec<A::Record>,
    fetcher: &Arc<dyn Fetcher>,
    now: i64,
    concurrency: usize,
) -> (Vec<A::Record>, CategoryOutcome) {
    let category = adapter.category();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (idx, record) in records.iter().cloned().enumerate() {
        let adapter = Arc::clone(&adapter);
        let fetcher = Arc::clone(fetcher);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let refreshed = adapter.refresh(&record, fetcher.as_ref(), now).await;
            (idx, refreshed)
        });
    }

    let mut refreshed: Vec<Option<A::Record>> = vec![None; records.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, record)) => refreshed[idx] = Some(record),
            // Adapters don't fail; a panicked probe leaves its record as it was.
            Err(e) => error!(category = %category, "Refresh task aborted: {}", e),
        }
    }

    let records: Vec<A::Record> = refreshed
        .into_iter()
        .zip(records)
        .map(|(new, old)| new.unwrap_or(old))
        .collect();

    let outcome = CategoryOutcome {
        category,
        total: records.len(),
        reachable: records.iter().filter(|r| A::is_reachable(r)).count(),
        added: 0,
    };
    (records, outcome)
}
