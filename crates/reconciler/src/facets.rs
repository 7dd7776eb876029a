//! Faceted filtering
//!
//! Facets combine by AND, options inside the match-status and signal facets by OR.
//! Option counts for a facet are marginal: the collection is re-filtered with every
//! other facet applied and that facet's own selection ignored, so a menu never
//! shows zero for an option that would produce results if clicked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signal_core::{FilterState, MarketFilter, MatchStatus, MergedStock, SignalLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Market,
    MatchStatus,
    Signal,
}

/// Marginal option counts for every facet. Every option is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCounts {
    pub market: BTreeMap<MarketFilter, usize>,
    pub match_status: BTreeMap<MatchStatus, usize>,
    pub signal: BTreeMap<SignalLevel, usize>,
}

fn market_passes(stock: &MergedStock, filter: &FilterState) -> bool {
    filter.market.matches(stock.stock.market)
}

fn status_passes(stock: &MergedStock, filter: &FilterState) -> bool {
    filter.match_statuses.is_empty() || filter.match_statuses.contains(&stock.match_status)
}

fn signal_passes(stock: &MergedStock, filter: &FilterState) -> bool {
    filter.signals.is_empty() || stock.signals().any(|s| filter.signals.contains(&s))
}

/// Whether `stock` passes every active facet except `skip`.
fn passes(stock: &MergedStock, filter: &FilterState, skip: Option<Facet>) -> bool {
    (skip == Some(Facet::Market) || market_passes(stock, filter))
        && (skip == Some(Facet::MatchStatus) || status_passes(stock, filter))
        && (skip == Some(Facet::Signal) || signal_passes(stock, filter))
}

/// Stocks passing all facets, ascending by rank with unranked entries last.
/// Ties keep universe order.
pub fn filter_and_sort(stocks: &[MergedStock], filter: &FilterState) -> Vec<MergedStock> {
    let mut filtered: Vec<MergedStock> = stocks
        .iter()
        .filter(|s| passes(s, filter, None))
        .cloned()
        .collect();
    sort_by_rank(&mut filtered);
    filtered
}

pub fn sort_by_rank(stocks: &mut [MergedStock]) {
    // slice::sort_by_key is stable
    stocks.sort_by_key(|s| (s.rank.is_none(), s.rank));
}

/// Recomputed from scratch on every call; O(universe x options).
pub fn facet_counts(stocks: &[MergedStock], filter: &FilterState) -> FacetCounts {
    let without = |facet: Facet| -> Vec<&MergedStock> {
        stocks.iter().filter(|s| passes(s, filter, Some(facet))).collect()
    };

    let market_base = without(Facet::Market);
    let market = MarketFilter::ALL
        .iter()
        .map(|option| {
            let count = market_base.iter().filter(|s| option.matches(s.stock.market)).count();
            (*option, count)
        })
        .collect();

    let status_base = without(Facet::MatchStatus);
    let match_status = MatchStatus::ALL
        .iter()
        .map(|option| {
            let count = status_base.iter().filter(|s| s.match_status == *option).count();
            (*option, count)
        })
        .collect();

    let signal_base = without(Facet::Signal);
    let signal = SignalLevel::ALL
        .iter()
        .map(|option| {
            let count = signal_base.iter().filter(|s| s.has_signal(*option)).count();
            (*option, count)
        })
        .collect();

    FacetCounts {
        market,
        match_status,
        signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{Market, StockIdentity};

    fn stock(code: &str, market: Market, status: MatchStatus, rank: Option<u32>) -> MergedStock {
        MergedStock {
            stock: StockIdentity {
                code: code.to_string(),
                name: code.to_string(),
                market,
            },
            rank,
            vision: None,
            api: None,
            match_status: status,
            confidence: status.confidence(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_sort_rank_ascending_unranked_last_stable() {
        let stocks = vec![
            stock("n1", Market::Kospi, MatchStatus::NoData, None),
            stock("r3", Market::Kospi, MatchStatus::NoData, Some(3)),
            stock("n2", Market::Kospi, MatchStatus::NoData, None),
            stock("r1", Market::Kospi, MatchStatus::NoData, Some(1)),
            stock("r1b", Market::Kospi, MatchStatus::NoData, Some(1)),
        ];

        let sorted = filter_and_sort(&stocks, &FilterState::default());
        let codes: Vec<&str> = sorted.iter().map(|s| s.stock.code.as_str()).collect();
        assert_eq!(codes, vec!["r1", "r1b", "r3", "n1", "n2"]);
    }

    #[test]
    fn test_market_counts_ignore_own_selection() {
        let stocks = vec![
            stock("a", Market::Kospi, MatchStatus::Match, None),
            stock("b", Market::Kosdaq, MatchStatus::Match, None),
            stock("c", Market::Kosdaq, MatchStatus::Mismatch, None),
            stock("d", Market::Unknown, MatchStatus::Match, None),
        ];
        let filter = FilterState::default()
            .with_market(MarketFilter::Kospi)
            .with_statuses([MatchStatus::Match]);

        let counts = facet_counts(&stocks, &filter);
        assert_eq!(counts.market[&MarketFilter::All], 3);
        assert_eq!(counts.market[&MarketFilter::Kospi], 1);
        assert_eq!(counts.market[&MarketFilter::Kosdaq], 1);

        // Status counts are restricted to KOSPI only
        assert_eq!(counts.match_status[&MatchStatus::Match], 1);
        assert_eq!(counts.match_status[&MatchStatus::Mismatch], 0);
    }

    #[test]
    fn test_empty_universe() {
        let counts = facet_counts(&[], &FilterState::default());
        assert!(counts.market.values().all(|c| *c == 0));
        assert_eq!(counts.signal.len(), 5);
        assert!(filter_and_sort(&[], &FilterState::default()).is_empty());
    }
}
