use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use signal_core::{
    normalize, MatchStatus, MergedStock, RawSourceRecord, SignalLevel, SnapshotInputs,
    SourceId, SourceRecord, StockWarning, WarningKind,
};

/// Merged view of one snapshot, in universe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub merged: Vec<MergedStock>,
    /// Source records whose code is not in the universe
    pub orphaned_records: usize,
    /// Hex SHA-256 of the serialized `merged` collection
    pub fingerprint: String,
}

/// Ordered decision list: presence first, then ordinal distance (0 / 1 / >=2).
pub fn classify(vision: Option<SignalLevel>, api: Option<SignalLevel>) -> MatchStatus {
    match (vision, api) {
        (None, None) => MatchStatus::NoData,
        (Some(_), None) => MatchStatus::VisionOnly,
        (None, Some(_)) => MatchStatus::ApiOnly,
        (Some(a), Some(b)) => match a.distance(&b) {
            0 => MatchStatus::Match,
            1 => MatchStatus::Partial,
            _ => MatchStatus::Mismatch,
        },
    }
}

/// Usable records for one source, keyed by stock code.
#[derive(Default)]
struct SourceIndex {
    records: HashMap<String, SourceRecord>,
    warnings: HashMap<String, Vec<StockWarning>>,
    orphans: usize,
}

impl SourceIndex {
    fn build(raw: &[RawSourceRecord], source: SourceId, universe: &HashSet<&str>) -> Self {
        let mut index = SourceIndex::default();

        for record in raw {
            if !universe.contains(record.code.as_str()) {
                tracing::debug!("Ignoring {} record for {} (not in universe)", source, record.code);
                index.orphans += 1;
                continue;
            }

            let Some(raw_signal) = record.signal.as_deref() else {
                tracing::debug!("{} record for {} has no signal", source, record.code);
                index.warn(
                    record,
                    source,
                    WarningKind::InvalidSignal,
                    format!("Missing {} signal", source),
                );
                continue;
            };

            let signal = match normalize(raw_signal, source) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::debug!("{} for {}", e, record.code);
                    index.warn(record, source, WarningKind::InvalidSignal, e.to_string());
                    continue;
                }
            };

            if index.records.contains_key(&record.code) {
                index.warn(
                    record,
                    source,
                    WarningKind::DuplicateRecord,
                    format!("Duplicate {} record for {}; first one kept", source, record.code),
                );
                continue;
            }

            index.records.insert(
                record.code.clone(),
                SourceRecord {
                    source,
                    code: record.code.clone(),
                    signal,
                    rationale: record.rationale.clone().unwrap_or_default(),
                    metadata: record.metadata.clone(),
                },
            );
        }

        index
    }

    fn warn(&mut self, record: &RawSourceRecord, source: SourceId, kind: WarningKind, message: String) {
        self.warnings.entry(record.code.clone()).or_default().push(StockWarning {
            source,
            kind,
            raw: record.signal.clone().unwrap_or_default(),
            message,
        });
    }
}

/// Produce one `MergedStock` per universe entry.
///
/// A source record that fails normalization counts as absent for that stock;
/// the failure is attached to the stock as a warning instead.
pub fn reconcile(inputs: &SnapshotInputs) -> Reconciliation {
    let universe: HashSet<&str> = inputs.universe.iter().map(|e| e.code.as_str()).collect();

    let vision = SourceIndex::build(&inputs.vision, SourceId::Vision, &universe);
    let api = SourceIndex::build(&inputs.api, SourceId::Api, &universe);

    let merged: Vec<MergedStock> = inputs
        .universe
        .iter()
        .map(|entry| {
            let vision_record = vision.records.get(&entry.code).cloned();
            let api_record = api.records.get(&entry.code).cloned();

            // Cloned, not taken: a code listed twice in the universe gets them on both rows
            let mut warnings = vision.warnings.get(&entry.code).cloned().unwrap_or_default();
            warnings.extend(api.warnings.get(&entry.code).cloned().unwrap_or_default());

            let match_status = classify(
                vision_record.as_ref().map(|r| r.signal),
                api_record.as_ref().map(|r| r.signal),
            );

            MergedStock {
                stock: entry.identity(),
                rank: entry.rank,
                vision: vision_record,
                api: api_record,
                match_status,
                confidence: match_status.confidence(),
                warnings,
            }
        })
        .collect();

    let orphaned_records = vision.orphans + api.orphans;
    if orphaned_records > 0 {
        tracing::debug!("{} source records referenced codes outside the universe", orphaned_records);
    }

    let fingerprint = fingerprint(&merged);

    Reconciliation {
        merged,
        orphaned_records,
        fingerprint,
    }
}

/// Hex SHA-256 over the canonical JSON form of a merged collection.
pub fn fingerprint(merged: &[MergedStock]) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_writer(&mut hasher, merged) {
        Ok(()) => hex::encode(hasher.finalize()),
        Err(e) => {
            tracing::error!("Failed to serialize merged stocks for fingerprint: {}", e);
            String::new()
        }
    }
}
