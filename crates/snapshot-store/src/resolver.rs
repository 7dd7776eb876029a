//! Snapshot Resolver
//!
//! Selects the input triple for a snapshot key and memoizes results.
//! Every cache entry is keyed by the snapshot it was computed from, so switching
//! keys can never surface another snapshot's stocks or counts. `latest` entries
//! additionally carry a generation that [`SnapshotResolver::refresh_latest`] bumps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use dashmap::DashMap;
use reconciler::{evaluate_reconciled, reconcile, Evaluation, Reconciliation};
use signal_core::{FilterState, SnapshotError, SnapshotKey, SnapshotSource};
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InputKey {
    snapshot: SnapshotKey,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EvaluationKey {
    input: InputKey,
    filter: FilterState,
}

pub struct SnapshotResolver {
    source: Arc<dyn SnapshotSource>,
    reconciliations: DashMap<InputKey, Arc<Reconciliation>>,
    evaluations: DashMap<EvaluationKey, Arc<Evaluation>>,
    latest_generation: AtomicU64,
}

impl SnapshotResolver {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            reconciliations: DashMap::new(),
            evaluations: DashMap::new(),
            latest_generation: AtomicU64::new(0),
        }
    }

    fn input_key(&self, snapshot: &SnapshotKey) -> InputKey {
        let generation = if snapshot.is_latest() {
            self.latest_generation.load(Ordering::SeqCst)
        } else {
            0
        };
        InputKey {
            snapshot: *snapshot,
            generation,
        }
    }

    /// A `latest` result computed under an older generation must not stay cached.
    fn is_current(&self, key: &InputKey) -> bool {
        !key.snapshot.is_latest() || key.generation == self.latest_generation.load(Ordering::SeqCst)
    }

    /// Evaluate `filter` against `snapshot`. A key with no archive is an error;
    /// there is no fallback to `latest`.
    pub async fn evaluate(
        &self,
        snapshot: &SnapshotKey,
        filter: &FilterState,
    ) -> Result<Arc<Evaluation>, SnapshotError> {
        let key = EvaluationKey {
            input: self.input_key(snapshot),
            filter: filter.clone(),
        };

        let cached = self.evaluations.get(&key).map(|e| Arc::clone(e.value()));
        if let Some(hit) = cached {
            tracing::debug!("Evaluation cache hit for {}", snapshot);
            return Ok(hit);
        }

        let reconciliation = self.reconciliation(&key.input).await?;
        let evaluation = Arc::new(evaluate_reconciled(*snapshot, &reconciliation, filter));

        // Write-once: if a concurrent caller got there first, keep theirs
        let stored = Arc::clone(self.evaluations.entry(key.clone()).or_insert(evaluation).value());
        // Checked after the insert so a refresh racing with it cannot be missed
        if !self.is_current(&key.input) {
            self.evaluations.remove(&key);
        }
        Ok(stored)
    }

    async fn reconciliation(&self, key: &InputKey) -> Result<Arc<Reconciliation>, SnapshotError> {
        let cached = self.reconciliations.get(key).map(|e| Arc::clone(e.value()));
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let inputs = self.source.load(&key.snapshot).await?;
        let reconciliation = Arc::new(reconcile(&inputs));
        tracing::info!(
            "Reconciled snapshot {}: {} stocks, {} orphaned records",
            key.snapshot,
            reconciliation.merged.len(),
            reconciliation.orphaned_records
        );

        let stored = Arc::clone(self.reconciliations.entry(key.clone()).or_insert(reconciliation).value());
        if !self.is_current(key) {
            self.reconciliations.remove(key);
        }
        Ok(stored)
    }

    /// New input arrived for `latest`: drop every cached `latest` result.
    pub fn refresh_latest(&self) -> u64 {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.reconciliations.retain(|k, _| !k.snapshot.is_latest());
        self.evaluations.retain(|k, _| !k.input.snapshot.is_latest());
        tracing::info!("Latest snapshot refreshed (generation {})", generation);
        generation
    }

    /// Drop every cached result for `snapshot`.
    pub fn evict(&self, snapshot: &SnapshotKey) {
        self.reconciliations.retain(|k, _| k.snapshot != *snapshot);
        self.evaluations.retain(|k, _| k.input.snapshot != *snapshot);
    }

    pub fn cached_evaluations(&self) -> usize {
        self.evaluations.len()
    }

    pub async fn list(&self) -> Result<Vec<SnapshotKey>, SnapshotError> {
        self.source.list().await
    }

    pub async fn archive_latest(&self, date: NaiveDate, time: NaiveTime) -> Result<SnapshotKey, SnapshotError> {
        let key = self.source.archive_latest(date, time).await?;
        tracing::info!("Archived latest snapshot as {}", key);
        Ok(key)
    }

    /// Prune archives older than `cutoff` from the source and evict them here.
    pub async fn prune_older_than(&self, cutoff: NaiveDate) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let removed = self.source.prune_older_than(cutoff).await?;
        for key in &removed {
            self.evict(key);
        }
        if !removed.is_empty() {
            tracing::info!("Pruned {} snapshots older than {}", removed.len(), cutoff);
        }
        Ok(removed)
    }

    /// Evaluate several snapshots concurrently, e.g. to warm the cache for a
    /// history view. Results come back in the order of `snapshots`.
    pub async fn precompute(
        self: &Arc<Self>,
        snapshots: Vec<SnapshotKey>,
        filter: FilterState,
    ) -> Vec<(SnapshotKey, Result<Arc<Evaluation>, SnapshotError>)> {
        let mut tasks = JoinSet::new();

        for (index, snapshot) in snapshots.iter().copied().enumerate() {
            let resolver = Arc::clone(self);
            let filter = filter.clone();
            tasks.spawn(async move {
                let result = resolver.evaluate(&snapshot, &filter).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Arc<Evaluation>, SnapshotError>>> =
            snapshots.iter().map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!("Precompute task failed: {}", e),
            }
        }

        snapshots
            .into_iter()
            .zip(slots)
            .map(|(snapshot, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(SnapshotError::Task(format!("evaluation of {snapshot} did not complete")))
                });
                (snapshot, result)
            })
            .collect()
    }
}
