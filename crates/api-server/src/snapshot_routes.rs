//! Snapshot Routes
//!
//! Listing, history, archiving, `latest` refresh and retention pruning.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use signal_core::SnapshotKey;
use snapshot_store::{build_history_index, HistoryEntry, RetentionPolicy};

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct PruneQuery {
    /// Archives dated more than this many days ago are removed (default: RETENTION_DAYS)
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PruneResult {
    pub cutoff_date: NaiveDate,
    pub removed: Vec<SnapshotKey>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    /// Snapshot time such as `2025-01-15T15:30` (default: now)
    pub at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResult {
    pub key: SnapshotKey,
}

#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub generation: u64,
}

pub fn snapshot_routes() -> Router<AppState> {
    Router::new()
        .route("/api/snapshots", get(list_snapshots))
        .route("/api/snapshots/history", get(get_history))
        .route("/api/snapshots/archive", post(archive_latest))
        .route("/api/snapshots/refresh", post(refresh_latest))
        .route("/api/snapshots/prune", post(prune_snapshots))
}

async fn list_snapshots(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SnapshotKey>>>, AppError> {
    let keys = state.resolver.list().await?;
    Ok(Json(ApiResponse::success(keys)))
}

async fn get_history(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, AppError> {
    let index = build_history_index(&state.resolver).await?;
    Ok(Json(ApiResponse::success(index)))
}

async fn archive_latest(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<ApiResponse<ArchiveResult>>, AppError> {
    let (date, time) = match query.at.as_deref() {
        Some(raw) => match raw.parse::<SnapshotKey>()? {
            SnapshotKey::Historical { date, time } => (date, time),
            SnapshotKey::Latest => {
                return Err(AppError::bad_request("archive time must be a date and time"))
            }
        },
        None => {
            let now = Local::now().naive_local();
            (now.date(), now.time())
        }
    };

    let key = state.resolver.archive_latest(date, time).await?;
    Ok(Json(ApiResponse::success(ArchiveResult { key })))
}

/// Called by the producer after it rewrites the `latest` lists.
async fn refresh_latest(State(state): State<AppState>) -> Json<ApiResponse<RefreshResult>> {
    let generation = state.resolver.refresh_latest();
    Json(ApiResponse::success(RefreshResult { generation }))
}

async fn prune_snapshots(
    State(state): State<AppState>,
    Query(query): Query<PruneQuery>,
) -> Result<Json<ApiResponse<PruneResult>>, AppError> {
    let policy = match query.days {
        Some(days) if days < 0 => {
            return Err(AppError::bad_request(format!("days must not be negative, got {days}")))
        }
        Some(days) => RetentionPolicy::new(days),
        None => state.config.retention(),
    };

    let cutoff_date = policy.cutoff(Local::now().date_naive());
    let removed = state.resolver.prune_older_than(cutoff_date).await?;

    Ok(Json(ApiResponse::success(PruneResult {
        cutoff_date,
        removed,
    })))
}
