use thiserror::Error;

use crate::types::{SnapshotKey, SourceId};

/// A raw signal string that is not one of the five known labels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognised {source_id} signal: {raw:?}")]
pub struct NormalizationError {
    pub source_id: SourceId,
    pub raw: String,
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    NotFound(SnapshotKey),

    #[error("Invalid snapshot key: {0}")]
    InvalidKey(String),

    #[error("Universe missing for snapshot {0}")]
    MissingUniverse(SnapshotKey),

    #[error("Snapshot already archived: {0}")]
    AlreadyArchived(SnapshotKey),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task error: {0}")]
    Task(String),
}
