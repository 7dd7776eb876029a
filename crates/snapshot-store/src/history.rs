//! History index and retention.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use signal_core::{FilterState, MatchStatus, SignalLevel, SnapshotError, SnapshotKey};

use crate::resolver::SnapshotResolver;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// One archived snapshot, summarised over its whole universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: SnapshotKey,
    pub total_stocks: usize,
    pub count_by_match_status: BTreeMap<MatchStatus, usize>,
    pub count_by_signal: BTreeMap<SignalLevel, usize>,
    pub avg_confidence: f64,
}

/// Summaries of every historical snapshot, newest first. Archives are
/// evaluated concurrently; ones that fail to load are skipped.
pub async fn build_history_index(
    resolver: &Arc<SnapshotResolver>,
) -> Result<Vec<HistoryEntry>, SnapshotError> {
    let keys: Vec<SnapshotKey> = resolver
        .list()
        .await?
        .into_iter()
        .filter(|k| !k.is_latest())
        .collect();

    let mut entries = Vec::with_capacity(keys.len());
    for (key, result) in resolver.precompute(keys, FilterState::default()).await {
        match result {
            Ok(evaluation) => entries.push(HistoryEntry {
                key,
                total_stocks: evaluation.overall.total,
                count_by_match_status: evaluation.overall.count_by_match_status.clone(),
                count_by_signal: evaluation.overall.count_by_signal.clone(),
                avg_confidence: evaluation.overall.avg_confidence,
            }),
            Err(e) => tracing::warn!("Skipping {} in history index: {}", key, e),
        }
    }

    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn new(days: i64) -> Self {
        Self { days }
    }

    /// Archives dated before this are expired.
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days)
    }
}
