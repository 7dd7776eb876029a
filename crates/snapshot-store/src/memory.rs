use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use signal_core::{SnapshotError, SnapshotInputs, SnapshotKey, SnapshotSource};

/// In-process snapshot source, for tests and for embedding the engine
/// behind a producer that already holds its lists in memory.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: DashMap<SnapshotKey, SnapshotInputs>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Historical keys are write-once; `latest` may be replaced.
    pub fn insert(&self, key: SnapshotKey, inputs: SnapshotInputs) -> Result<(), SnapshotError> {
        if key.is_latest() {
            self.snapshots.insert(key, inputs);
            return Ok(());
        }
        match self.snapshots.entry(key) {
            Entry::Occupied(_) => Err(SnapshotError::AlreadyArchived(key)),
            Entry::Vacant(slot) => {
                slot.insert(inputs);
                Ok(())
            }
        }
    }

    pub fn with_snapshot(self, key: SnapshotKey, inputs: SnapshotInputs) -> Self {
        self.snapshots.insert(key, inputs);
        self
    }
}

#[async_trait]
impl SnapshotSource for MemorySnapshotStore {
    async fn load(&self, key: &SnapshotKey) -> Result<SnapshotInputs, SnapshotError> {
        self.snapshots
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(SnapshotError::NotFound(*key))
    }

    async fn archive_latest(&self, date: NaiveDate, time: NaiveTime) -> Result<SnapshotKey, SnapshotError> {
        let inputs = self
            .snapshots
            .get(&SnapshotKey::Latest)
            .map(|entry| entry.value().clone())
            .ok_or(SnapshotError::NotFound(SnapshotKey::Latest))?;

        let key = SnapshotKey::historical(date, time);
        self.insert(key, inputs)?;
        Ok(key)
    }

    async fn list(&self) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let mut keys: Vec<SnapshotKey> = self.snapshots.iter().map(|e| *e.key()).collect();
        // Latest sorts lowest, so put it back in front after the descending sort
        keys.sort_by(|a, b| b.cmp(a));
        if let Some(pos) = keys.iter().position(|k| k.is_latest()) {
            let latest = keys.remove(pos);
            keys.insert(0, latest);
        }
        Ok(keys)
    }

    async fn prune_older_than(&self, cutoff: NaiveDate) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let mut expired: Vec<SnapshotKey> = self
            .snapshots
            .iter()
            .map(|e| *e.key())
            .filter(|k| k.date().is_some_and(|d| d < cutoff))
            .collect();
        expired.sort_by(|a, b| b.cmp(a));

        for key in &expired {
            self.snapshots.remove(key);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_archive_latest_is_write_once() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, SnapshotInputs::default());
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let time = NaiveTime::from_hms_opt(15, 30, 0).unwrap();

        let key = store.archive_latest(date, time).await.unwrap();
        assert_eq!(key.to_string(), "2025-02-03 15:30");
        assert!(matches!(
            store.archive_latest(date, time).await,
            Err(SnapshotError::AlreadyArchived(_))
        ));
        assert_eq!(store.list().await.unwrap(), vec![SnapshotKey::Latest, key]);
    }

    #[tokio::test]
    async fn test_archive_without_latest() {
        let store = MemorySnapshotStore::new();
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        assert!(matches!(
            store.archive_latest(date, time).await,
            Err(SnapshotError::NotFound(SnapshotKey::Latest))
        ));
    }
}
