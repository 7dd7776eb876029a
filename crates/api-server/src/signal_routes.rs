//! Signal Routes
//!
//! Filtered evaluations of one snapshot, as JSON or as a markdown report.
//! `status` and `signal` take comma-separated values; unknown values are rejected
//! rather than silently dropped.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reconciler::render_markdown;
use serde::Deserialize;
use signal_core::{normalize, FilterState, MarketFilter, MatchStatus, SnapshotError, SnapshotKey, SourceId};

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SignalQuery {
    pub snapshot: Option<String>,
    pub market: Option<String>,
    pub status: Option<String>,
    pub signal: Option<String>,
}

impl SignalQuery {
    /// Absent means `latest`.
    pub fn snapshot_key(&self) -> Result<SnapshotKey, SnapshotError> {
        match self.snapshot.as_deref() {
            Some(raw) => raw.parse(),
            None => Ok(SnapshotKey::Latest),
        }
    }

    pub fn filter(&self) -> Result<FilterState, String> {
        let market = match self.market.as_deref() {
            Some(raw) => raw.parse::<MarketFilter>()?,
            None => MarketFilter::All,
        };
        let statuses = parse_list(self.status.as_deref(), |s| s.parse::<MatchStatus>())?;
        let signals = parse_list(self.signal.as_deref(), |s| {
            normalize(s, SourceId::Api).map_err(|_| format!("unknown signal filter: {s}"))
        })?;

        Ok(FilterState::default()
            .with_market(market)
            .with_statuses(statuses)
            .with_signals(signals))
    }
}

fn parse_list<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse)
        .collect()
}

pub fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signals", get(get_signals))
        .route("/api/signals/report", get(get_report))
}

async fn get_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalQuery>,
) -> Result<Response, AppError> {
    let snapshot = query.snapshot_key()?;
    let filter = query.filter().map_err(AppError::bad_request)?;

    let evaluation = state.resolver.evaluate(&snapshot, &filter).await?;
    Ok(Json(ApiResponse::success(evaluation.as_ref())).into_response())
}

async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<SignalQuery>,
) -> Result<Response, AppError> {
    let snapshot = query.snapshot_key()?;
    let filter = query.filter().map_err(AppError::bad_request)?;

    let evaluation = state.resolver.evaluate(&snapshot, &filter).await?;
    let markdown = render_markdown(&evaluation);
    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], markdown).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::SignalLevel;

    fn query(market: Option<&str>, status: Option<&str>, signal: Option<&str>) -> SignalQuery {
        SignalQuery {
            snapshot: None,
            market: market.map(String::from),
            status: status.map(String::from),
            signal: signal.map(String::from),
        }
    }

    #[test]
    fn test_empty_query_is_unfiltered_latest() {
        let q = SignalQuery::default();
        assert_eq!(q.snapshot_key().unwrap(), SnapshotKey::Latest);
        assert!(q.filter().unwrap().is_unfiltered());
    }

    #[test]
    fn test_multi_select_lists() {
        let filter = query(Some("kosdaq"), Some("match, source_a_only,,"), Some("적극매수,strong_sell"))
            .filter()
            .unwrap();

        assert_eq!(filter.market, MarketFilter::Kosdaq);
        assert_eq!(
            filter.match_statuses.into_iter().collect::<Vec<_>>(),
            vec![MatchStatus::Match, MatchStatus::VisionOnly]
        );
        assert_eq!(
            filter.signals.into_iter().collect::<Vec<_>>(),
            vec![SignalLevel::StrongSell, SignalLevel::StrongBuy]
        );
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(query(Some("NYSE"), None, None).filter().is_err());
        assert!(query(None, Some("maybe"), None).filter().is_err());
        assert!(query(None, None, Some("moon")).filter().is_err());
    }

    #[test]
    fn test_snapshot_key_parsing() {
        let q = SignalQuery {
            snapshot: Some("2025-01-15T09:30".to_string()),
            ..Default::default()
        };
        assert_eq!(q.snapshot_key().unwrap().to_string(), "2025-01-15 09:30");

        let bad = SignalQuery {
            snapshot: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.snapshot_key(), Err(SnapshotError::InvalidKey(_))));
    }
}
