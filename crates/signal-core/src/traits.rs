use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::{SnapshotError, SnapshotInputs, SnapshotKey};

/// Storage collaborator that hands out the input triple for a snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Load the inputs addressed by `key`. A key with no archive behind it
    /// must yield `SnapshotError::NotFound`, never another snapshot's data.
    async fn load(&self, key: &SnapshotKey) -> Result<SnapshotInputs, SnapshotError>;

    /// Freeze the current `latest` inputs under a historical key. Fails with
    /// `AlreadyArchived` if that key exists.
    async fn archive_latest(&self, date: NaiveDate, time: NaiveTime) -> Result<SnapshotKey, SnapshotError>;

    /// Available keys, `Latest` first then historical keys newest first.
    async fn list(&self) -> Result<Vec<SnapshotKey>, SnapshotError>;

    /// Drop every archive dated strictly before `cutoff`, returning the removed keys.
    async fn prune_older_than(&self, cutoff: NaiveDate) -> Result<Vec<SnapshotKey>, SnapshotError>;
}
