//! Filesystem Snapshot Store
//!
//! ```text
//! <root>/latest/{vision.json, api.json, universe.json}
//! <root>/history/<YYYY-MM-DD>/<HHMM>/{vision.json, api.json, universe.json}
//! ```
//!
//! Source files are the upstream `{"date": .., "results": [..]}` envelope or a
//! bare array. A missing source file loads as an empty list, and a record that
//! cannot be read is skipped on its own.
//!
//! Writes go to a hidden staging directory next to the target and are renamed
//! into place, so a failed save or archive never leaves a half-written snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;
use signal_core::{
    RawSourceRecord, SnapshotError, SnapshotInputs, SnapshotKey, SnapshotSource, UniverseEntry,
};

const LATEST_DIR: &str = "latest";
const HISTORY_DIR: &str = "history";
const VISION_FILE: &str = "vision.json";
const API_FILE: &str = "api.json";
const UNIVERSE_FILE: &str = "universe.json";

pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_for(&self, key: &SnapshotKey) -> PathBuf {
        match key {
            SnapshotKey::Latest => self.root.join(LATEST_DIR),
            SnapshotKey::Historical { date, time } => self
                .root
                .join(HISTORY_DIR)
                .join(date.format("%Y-%m-%d").to_string())
                .join(time.format("%H%M").to_string()),
        }
    }

    /// Write an input triple. Historical keys are write-once; `latest` is replaced.
    pub async fn save(&self, key: &SnapshotKey, inputs: &SnapshotInputs) -> Result<(), SnapshotError> {
        let dir = self.dir_for(key);
        if !key.is_latest() && dir_exists(&dir).await? {
            return Err(SnapshotError::AlreadyArchived(*key));
        }

        let staging = prepare_staging(&dir).await?;
        let written = write_inputs(&staging, key, inputs).await;
        commit_staging(&staging, &dir, written, key.is_latest()).await?;

        tracing::info!("Saved snapshot {} to {}", key, dir.display());
        Ok(())
    }

    async fn copy_latest_into_history(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<SnapshotKey, SnapshotError> {
        let source_dir = self.dir_for(&SnapshotKey::Latest);
        if !dir_exists(&source_dir).await? {
            return Err(SnapshotError::NotFound(SnapshotKey::Latest));
        }
        // An archive without a universe could never be loaded nor redone
        if !file_exists(&source_dir.join(UNIVERSE_FILE)).await? {
            return Err(SnapshotError::MissingUniverse(SnapshotKey::Latest));
        }

        let key = SnapshotKey::historical(date, time);
        let target_dir = self.dir_for(&key);
        if dir_exists(&target_dir).await? {
            return Err(SnapshotError::AlreadyArchived(key));
        }

        let staging = prepare_staging(&target_dir).await?;
        let copied = copy_inputs(&source_dir, &staging, &key).await;
        commit_staging(&staging, &target_dir, copied, false).await?;

        tracing::info!("Archived latest as {}", key);
        Ok(key)
    }

    async fn read_source(&self, key: &SnapshotKey, dir: &Path, file: &str) -> Result<Vec<RawSourceRecord>, SnapshotError> {
        let path = dir.join(file);
        match read_json::<Value>(&path).await? {
            Some(value) => source_records(&path, value),
            None => {
                tracing::warn!("{} has no {}; treating source as empty", key, file);
                Ok(Vec::new())
            }
        }
    }

    async fn historical_keys(&self) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let history = self.root.join(HISTORY_DIR);
        let mut keys = Vec::new();

        for date_dir in list_dirs(&history).await? {
            let Some(date) = dir_name(&date_dir)
                .and_then(|name| NaiveDate::parse_from_str(&name, "%Y-%m-%d").ok())
            else {
                tracing::debug!("Skipping unrecognised history entry {}", date_dir.display());
                continue;
            };

            for time_dir in list_dirs(&date_dir).await? {
                match dir_name(&time_dir).and_then(|name| NaiveTime::parse_from_str(&name, "%H%M").ok()) {
                    Some(time) => keys.push(SnapshotKey::historical(date, time)),
                    None => tracing::debug!("Skipping unrecognised history entry {}", time_dir.display()),
                }
            }
        }

        keys.sort_by(|a, b| b.cmp(a));
        Ok(keys)
    }
}

#[async_trait]
impl SnapshotSource for FsSnapshotStore {
    async fn load(&self, key: &SnapshotKey) -> Result<SnapshotInputs, SnapshotError> {
        let dir = self.dir_for(key);
        if !dir_exists(&dir).await? {
            return Err(SnapshotError::NotFound(*key));
        }

        let universe_path = dir.join(UNIVERSE_FILE);
        let universe = match read_json::<Value>(&universe_path).await? {
            Some(value) => universe_entries(&universe_path, value)?,
            None => return Err(SnapshotError::MissingUniverse(*key)),
        };

        let vision = self.read_source(key, &dir, VISION_FILE).await?;
        let api = self.read_source(key, &dir, API_FILE).await?;

        tracing::debug!(
            "Loaded {}: {} universe, {} vision, {} api records",
            key,
            universe.len(),
            vision.len(),
            api.len()
        );

        Ok(SnapshotInputs {
            vision,
            api,
            universe,
        })
    }

    async fn archive_latest(&self, date: NaiveDate, time: NaiveTime) -> Result<SnapshotKey, SnapshotError> {
        self.copy_latest_into_history(date, time).await
    }

    async fn list(&self) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let mut keys = Vec::new();
        if dir_exists(&self.dir_for(&SnapshotKey::Latest)).await? {
            keys.push(SnapshotKey::Latest);
        }
        keys.extend(self.historical_keys().await?);
        Ok(keys)
    }

    async fn prune_older_than(&self, cutoff: NaiveDate) -> Result<Vec<SnapshotKey>, SnapshotError> {
        let history = self.root.join(HISTORY_DIR);
        let expired: Vec<SnapshotKey> = self
            .historical_keys()
            .await?
            .into_iter()
            .filter(|k| k.date().is_some_and(|d| d < cutoff))
            .collect();

        let mut removed_dates: Vec<NaiveDate> = expired.iter().filter_map(|k| k.date()).collect();
        removed_dates.dedup();

        for date in removed_dates {
            let dir = history.join(date.format("%Y-%m-%d").to_string());
            tokio::fs::remove_dir_all(&dir).await?;
            tracing::info!("Removed archive {} (older than {})", dir.display(), cutoff);
        }

        Ok(expired)
    }
}

async fn dir_exists(path: &Path) -> Result<bool, SnapshotError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn list_dirs(path: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

async fn file_exists(path: &Path) -> Result<bool, SnapshotError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

/// `Ok(None)` when the file does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SnapshotError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })
}

fn parse_error(path: &Path, message: &str) -> SnapshotError {
    SnapshotError::Parse {
        path: path.display().to_string(),
        source: serde_json::Error::custom(message),
    }
}

/// Envelope or bare array. Records that fail to deserialize are dropped one by
/// one; the rest of the file still loads.
fn source_records(path: &Path, value: Value) -> Result<Vec<RawSourceRecord>, SnapshotError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("results") {
            Some(Value::Array(items)) => items,
            _ => return Err(parse_error(path, "expected a \"results\" array")),
        },
        _ => return Err(parse_error(path, "expected an array or a {\"results\": [..]} object")),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawSourceRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping record {} in {}: {}", index, path.display(), e),
        }
    }
    Ok(records)
}

fn universe_entries(path: &Path, value: Value) -> Result<Vec<UniverseEntry>, SnapshotError> {
    let stocks = match value {
        Value::Object(mut envelope) => envelope
            .remove("stocks")
            .ok_or_else(|| parse_error(path, "expected a \"stocks\" array"))?,
        other => other,
    };

    serde_json::from_value(stocks).map_err(|source| SnapshotError::Parse {
        path: path.display().to_string(),
        source,
    })
}

async fn write_inputs(dir: &Path, key: &SnapshotKey, inputs: &SnapshotInputs) -> Result<(), SnapshotError> {
    let date = key.date().map(|d| d.format("%Y-%m-%d").to_string());
    write_json(
        &dir.join(VISION_FILE),
        &serde_json::json!({ "date": date, "results": inputs.vision }),
    )
    .await?;
    write_json(
        &dir.join(API_FILE),
        &serde_json::json!({ "date": date, "results": inputs.api }),
    )
    .await?;
    write_json(&dir.join(UNIVERSE_FILE), &inputs.universe).await
}

/// Copy the `latest` triple into `to`. Only the universe is required.
async fn copy_inputs(from: &Path, to: &Path, key: &SnapshotKey) -> Result<(), SnapshotError> {
    for file in [VISION_FILE, API_FILE] {
        match tokio::fs::copy(from.join(file), to.join(file)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("latest/{} missing; archiving {} without it", file, key);
            }
            Err(e) => return Err(e.into()),
        }
    }
    tokio::fs::copy(from.join(UNIVERSE_FILE), to.join(UNIVERSE_FILE)).await?;
    Ok(())
}

fn staging_path(target: &Path) -> PathBuf {
    let name = dir_name(target).unwrap_or_default();
    target.with_file_name(format!(".{name}.staging"))
}

async fn prepare_staging(target: &Path) -> Result<PathBuf, SnapshotError> {
    let staging = staging_path(target);
    // Leftover from an interrupted write
    discard_dir(&staging).await;
    tokio::fs::create_dir_all(&staging).await?;
    Ok(staging)
}

/// Move a filled staging directory onto `target`, or throw it away if filling
/// failed. Only `replace` allows an existing target to be overwritten.
async fn commit_staging(
    staging: &Path,
    target: &Path,
    filled: Result<(), SnapshotError>,
    replace: bool,
) -> Result<(), SnapshotError> {
    let committed = match filled {
        Ok(()) => swap_into_place(staging, target, replace).await,
        Err(e) => Err(e),
    };
    if committed.is_err() {
        discard_dir(staging).await;
    }
    committed
}

async fn swap_into_place(staging: &Path, target: &Path, replace: bool) -> Result<(), SnapshotError> {
    if replace && dir_exists(target).await? {
        tokio::fs::remove_dir_all(target).await?;
    }
    tokio::fs::rename(staging, target).await?;
    Ok(())
}

async fn discard_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
