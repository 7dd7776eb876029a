use serde::{Deserialize, Serialize};
use signal_core::{FilterState, MergedStock, SnapshotInputs, SnapshotKey};

use crate::aggregate::{aggregate, SignalStats};
use crate::facets::{facet_counts, filter_and_sort, FacetCounts};
use crate::reconcile::{reconcile, Reconciliation};

/// Everything the display layer needs for one (snapshot, filter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub snapshot: SnapshotKey,
    pub filter: FilterState,
    /// Full, unfiltered merged collection in universe order
    pub merged: Vec<MergedStock>,
    /// Stats over `merged` (grand total)
    pub overall: SignalStats,
    /// Stats over `filtered`
    pub stats: SignalStats,
    pub facets: FacetCounts,
    /// Filtered and sorted by rank
    pub filtered: Vec<MergedStock>,
    pub orphaned_records: usize,
    pub fingerprint: String,
}

pub fn evaluate(snapshot: SnapshotKey, inputs: &SnapshotInputs, filter: &FilterState) -> Evaluation {
    let reconciliation = reconcile(inputs);
    evaluate_reconciled(snapshot, &reconciliation, filter)
}

/// Filter-dependent half of [`evaluate`], for callers that already hold the
/// reconciliation of `snapshot`.
pub fn evaluate_reconciled(
    snapshot: SnapshotKey,
    reconciliation: &Reconciliation,
    filter: &FilterState,
) -> Evaluation {
    let merged = &reconciliation.merged;
    let filtered = filter_and_sort(merged, filter);

    Evaluation {
        snapshot,
        filter: filter.clone(),
        overall: aggregate(merged),
        stats: aggregate(&filtered),
        facets: facet_counts(merged, filter),
        filtered,
        merged: merged.clone(),
        orphaned_records: reconciliation.orphaned_records,
        fingerprint: reconciliation.fingerprint.clone(),
    }
}
