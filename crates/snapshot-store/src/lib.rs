//! Snapshot Store
//!
//! Resolves snapshot keys to input triples and caches evaluations per
//! (snapshot, filter). Historical archives are immutable; only `latest`
//! is ever re-evaluated.

pub mod fs_store;
pub mod history;
pub mod memory;
pub mod resolver;

pub use fs_store::FsSnapshotStore;
pub use history::{build_history_index, HistoryEntry, RetentionPolicy, DEFAULT_RETENTION_DAYS};
pub use memory::MemorySnapshotStore;
pub use resolver::SnapshotResolver;
