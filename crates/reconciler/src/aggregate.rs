use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signal_core::{MatchStatus, MergedStock, SignalLevel};

/// Summary statistics over a collection of merged stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total: usize,
    /// Every status is present, zero-filled
    pub count_by_match_status: BTreeMap<MatchStatus, usize>,
    /// Signal occurrences, not stocks: a stock with two `buy` opinions adds 2
    pub count_by_signal: BTreeMap<SignalLevel, usize>,
    pub avg_confidence: f64,
}

impl Default for SignalStats {
    fn default() -> Self {
        Self {
            total: 0,
            count_by_match_status: MatchStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            count_by_signal: SignalLevel::ALL.iter().map(|s| (*s, 0)).collect(),
            avg_confidence: 0.0,
        }
    }
}

pub fn aggregate<'a, I>(stocks: I) -> SignalStats
where
    I: IntoIterator<Item = &'a MergedStock>,
{
    let mut stats = SignalStats::default();
    let mut confidence_sum = 0.0;

    for stock in stocks {
        stats.total += 1;
        confidence_sum += stock.confidence;
        *stats.count_by_match_status.entry(stock.match_status).or_insert(0) += 1;
        for signal in stock.signals() {
            *stats.count_by_signal.entry(signal).or_insert(0) += 1;
        }
    }

    if stats.total > 0 {
        stats.avg_confidence = confidence_sum / stats.total as f64;
    }

    stats
}
