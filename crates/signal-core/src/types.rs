use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SnapshotError;

/// Five-level trading signal, ordered from most bearish to most bullish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    StrongSell,
    Sell,
    Neutral,
    Buy,
    StrongBuy,
}

impl SignalLevel {
    pub const ALL: [SignalLevel; 5] = [
        SignalLevel::StrongSell,
        SignalLevel::Sell,
        SignalLevel::Neutral,
        SignalLevel::Buy,
        SignalLevel::StrongBuy,
    ];

    /// Ordinal score in [-2, 2]
    pub fn score(&self) -> i32 {
        match self {
            SignalLevel::StrongSell => -2,
            SignalLevel::Sell => -1,
            SignalLevel::Neutral => 0,
            SignalLevel::Buy => 1,
            SignalLevel::StrongBuy => 2,
        }
    }

    /// Absolute ordinal distance between two levels (0..=4).
    pub fn distance(&self, other: &SignalLevel) -> u32 {
        (self.score() - other.score()).unsigned_abs()
    }

    /// Label used by the upstream classifiers
    pub fn label(&self) -> &'static str {
        match self {
            SignalLevel::StrongSell => "적극매도",
            SignalLevel::Sell => "매도",
            SignalLevel::Neutral => "중립",
            SignalLevel::Buy => "매수",
            SignalLevel::StrongBuy => "적극매수",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLevel::StrongSell => "strong_sell",
            SignalLevel::Sell => "sell",
            SignalLevel::Neutral => "neutral",
            SignalLevel::Buy => "buy",
            SignalLevel::StrongBuy => "strong_buy",
        }
    }
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upstream classifier a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Screenshot-based vision classifier (source A)
    Vision,
    /// Market-data API classifier (source B)
    Api,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Vision => write!(f, "vision"),
            SourceId::Api => write!(f, "api"),
        }
    }
}

/// Listing exchange. KOSPI is exchange A, KOSDAQ is exchange B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
    Unknown,
}

impl Market {
    /// Lenient parse; anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "KOSPI" | "A" => Market::Kospi,
            "KOSDAQ" | "B" => Market::Kosdaq,
            _ => match trimmed {
                "코스피" => Market::Kospi,
                "코스닥" => Market::Kosdaq,
                _ => Market::Unknown,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
            Market::Unknown => "UNKNOWN",
        }
    }
}

impl<'de> Deserialize<'de> for Market {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Market::parse(&raw))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-select market facet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "KOSPI")]
    Kospi,
    #[serde(rename = "KOSDAQ")]
    Kosdaq,
}

impl MarketFilter {
    pub const ALL: [MarketFilter; 3] = [MarketFilter::All, MarketFilter::Kospi, MarketFilter::Kosdaq];

    /// Exact match unless `All`; `Unknown` markets only pass `All`.
    pub fn matches(&self, market: Market) -> bool {
        match self {
            MarketFilter::All => true,
            MarketFilter::Kospi => market == Market::Kospi,
            MarketFilter::Kosdaq => market == Market::Kosdaq,
        }
    }
}

impl FromStr for MarketFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(MarketFilter::All);
        }
        match Market::parse(trimmed) {
            Market::Kospi => Ok(MarketFilter::Kospi),
            Market::Kosdaq => Ok(MarketFilter::Kosdaq),
            Market::Unknown => Err(format!("unknown market filter: {s}")),
        }
    }
}

/// Reconciliation outcome for one stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Match,
    Partial,
    Mismatch,
    VisionOnly,
    ApiOnly,
    NoData,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 6] = [
        MatchStatus::Match,
        MatchStatus::Partial,
        MatchStatus::Mismatch,
        MatchStatus::VisionOnly,
        MatchStatus::ApiOnly,
        MatchStatus::NoData,
    ];

    /// Trust placed in the combined call. Depends on the status only,
    /// never on the signal values themselves.
    pub fn confidence(&self) -> f64 {
        match self {
            MatchStatus::Match => 1.0,
            MatchStatus::Partial => 0.7,
            MatchStatus::VisionOnly | MatchStatus::ApiOnly => 0.5,
            MatchStatus::Mismatch => 0.3,
            MatchStatus::NoData => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Match => "match",
            MatchStatus::Partial => "partial",
            MatchStatus::Mismatch => "mismatch",
            MatchStatus::VisionOnly => "vision_only",
            MatchStatus::ApiOnly => "api_only",
            MatchStatus::NoData => "no_data",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "match" => Ok(MatchStatus::Match),
            "partial" => Ok(MatchStatus::Partial),
            "mismatch" => Ok(MatchStatus::Mismatch),
            "vision_only" | "source_a_only" => Ok(MatchStatus::VisionOnly),
            "api_only" | "source_b_only" => Ok(MatchStatus::ApiOnly),
            "no_data" => Ok(MatchStatus::NoData),
            _ => Err(format!("unknown match status: {s}")),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange-assigned identity of a stock. Immutable within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIdentity {
    pub code: String,
    pub name: String,
    pub market: Market,
}

/// One row of the reference universe for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub code: String,
    pub name: String,
    pub market: Market,
    /// Externally supplied ranking (e.g. trading-value rank), lower first
    #[serde(default)]
    pub rank: Option<u32>,
}

impl UniverseEntry {
    pub fn identity(&self) -> StockIdentity {
        StockIdentity {
            code: self.code.clone(),
            name: self.name.clone(),
            market: self.market,
        }
    }
}

/// Source record as produced upstream, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourceRecord {
    pub code: String,
    /// `None` when upstream left the label out or sent `null`. Non-string
    /// values are kept as their JSON text and fail normalization.
    #[serde(default, deserialize_with = "lenient_signal")]
    pub signal: Option<String>,
    #[serde(default, alias = "reason")]
    pub rationale: Option<String>,
    /// Every other upstream field, kept opaque
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RawSourceRecord {
    pub fn new(code: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            signal: Some(signal.into()),
            rationale: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

fn lenient_signal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(label) => Some(label),
        other => Some(other.to_string()),
    })
}

/// A normalized per-source opinion on one stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: SourceId,
    pub code: String,
    pub signal: SignalLevel,
    pub rationale: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InvalidSignal,
    DuplicateRecord,
}

/// Non-fatal problem found while reconciling one stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWarning {
    pub source: SourceId,
    pub kind: WarningKind,
    pub raw: String,
    pub message: String,
}

/// Reconciled view of one universe stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedStock {
    #[serde(flatten)]
    pub stock: StockIdentity,
    pub rank: Option<u32>,
    pub vision: Option<SourceRecord>,
    pub api: Option<SourceRecord>,
    pub match_status: MatchStatus,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StockWarning>,
}

impl MergedStock {
    pub fn vision_signal(&self) -> Option<SignalLevel> {
        self.vision.as_ref().map(|r| r.signal)
    }

    pub fn api_signal(&self) -> Option<SignalLevel> {
        self.api.as_ref().map(|r| r.signal)
    }

    /// Signals present on this stock, vision first.
    pub fn signals(&self) -> impl Iterator<Item = SignalLevel> + '_ {
        self.vision_signal().into_iter().chain(self.api_signal())
    }

    /// True if either source's signal equals `level`.
    pub fn has_signal(&self, level: SignalLevel) -> bool {
        self.signals().any(|s| s == level)
    }
}

/// Active filter selections. Empty sets mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub market: MarketFilter,
    #[serde(default)]
    pub match_statuses: BTreeSet<MatchStatus>,
    #[serde(default)]
    pub signals: BTreeSet<SignalLevel>,
}

impl FilterState {
    pub fn with_market(mut self, market: MarketFilter) -> Self {
        self.market = market;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = MatchStatus>) -> Self {
        self.match_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_signals(mut self, signals: impl IntoIterator<Item = SignalLevel>) -> Self {
        self.signals = signals.into_iter().collect();
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.market == MarketFilter::All && self.match_statuses.is_empty() && self.signals.is_empty()
    }
}

/// Addresses one immutable set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotKey {
    Latest,
    Historical { date: NaiveDate, time: NaiveTime },
}

impl SnapshotKey {
    /// Historical key truncated to minute precision.
    pub fn historical(date: NaiveDate, time: NaiveTime) -> Self {
        let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        SnapshotKey::Historical { date, time }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, SnapshotKey::Latest)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            SnapshotKey::Latest => None,
            SnapshotKey::Historical { date, .. } => Some(*date),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKey::Latest => f.write_str("latest"),
            SnapshotKey::Historical { date, time } => {
                write!(f, "{} {}", date.format("%Y-%m-%d"), time.format("%H:%M"))
            }
        }
    }
}

impl FromStr for SnapshotKey {
    type Err = SnapshotError;

    /// Accepts `latest`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DD/HHMM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(SnapshotKey::Latest);
        }

        let (date_part, time_part) = trimmed
            .split_once(|c: char| c == ' ' || c == 'T' || c == '/')
            .ok_or_else(|| SnapshotError::InvalidKey(s.to_string()))?;

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| SnapshotError::InvalidKey(s.to_string()))?;
        let time = NaiveTime::parse_from_str(time_part, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time_part, "%H%M"))
            .map_err(|_| SnapshotError::InvalidKey(s.to_string()))?;

        Ok(SnapshotKey::historical(date, time))
    }
}

impl Serialize for SnapshotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SnapshotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The (vision, api, universe) triple addressed by one snapshot key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInputs {
    #[serde(default)]
    pub vision: Vec<RawSourceRecord>,
    #[serde(default)]
    pub api: Vec<RawSourceRecord>,
    #[serde(default)]
    pub universe: Vec<UniverseEntry>,
}
