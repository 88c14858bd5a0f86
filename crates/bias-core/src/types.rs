use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BiasError;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Five-level directional bias derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiasLevel {
    UrsaMajor,
    UrsaMinor,
    Neutral,
    ToroMinor,
    ToroMajor,
}

impl BiasLevel {
    /// Band map from composite score. Bands are inclusive-low, exclusive-high:
    /// a score of exactly 0.20 is TORO_MINOR, exactly -0.20 is NEUTRAL.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.60 {
            BiasLevel::ToroMajor
        } else if score >= 0.20 {
            BiasLevel::ToroMinor
        } else if score >= -0.20 {
            BiasLevel::Neutral
        } else if score >= -0.60 {
            BiasLevel::UrsaMinor
        } else {
            BiasLevel::UrsaMajor
        }
    }

    pub fn numeric(&self) -> i32 {
        match self {
            BiasLevel::UrsaMajor => 1,
            BiasLevel::UrsaMinor => 2,
            BiasLevel::Neutral => 3,
            BiasLevel::ToroMinor => 4,
            BiasLevel::ToroMajor => 5,
        }
    }

    pub fn from_numeric(numeric: i32) -> Option<Self> {
        match numeric {
            1 => Some(BiasLevel::UrsaMajor),
            2 => Some(BiasLevel::UrsaMinor),
            3 => Some(BiasLevel::Neutral),
            4 => Some(BiasLevel::ToroMinor),
            5 => Some(BiasLevel::ToroMajor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BiasLevel::UrsaMajor => "URSA_MAJOR",
            BiasLevel::UrsaMinor => "URSA_MINOR",
            BiasLevel::Neutral => "NEUTRAL",
            BiasLevel::ToroMinor => "TORO_MINOR",
            BiasLevel::ToroMajor => "TORO_MAJOR",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, BiasLevel::ToroMinor | BiasLevel::ToroMajor)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, BiasLevel::UrsaMinor | BiasLevel::UrsaMajor)
    }
}

impl fmt::Display for BiasLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasLevel {
    type Err = BiasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(' ', "_").as_str() {
            "URSA_MAJOR" => Ok(BiasLevel::UrsaMajor),
            "URSA_MINOR" => Ok(BiasLevel::UrsaMinor),
            "NEUTRAL" => Ok(BiasLevel::Neutral),
            "TORO_MINOR" => Ok(BiasLevel::ToroMinor),
            "TORO_MAJOR" => Ok(BiasLevel::ToroMajor),
            other => Err(BiasError::UnknownBiasLevel(other.to_string())),
        }
    }
}

/// Six-level vocabulary used by the circuit breaker and scheduler
/// (no neutral; LEAN_* levels sit either side of the midline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerBiasLevel {
    MajorUrsa,
    MinorUrsa,
    LeanUrsa,
    LeanToro,
    MinorToro,
    MajorToro,
}

impl SchedulerBiasLevel {
    pub fn numeric(&self) -> i32 {
        match self {
            SchedulerBiasLevel::MajorUrsa => 1,
            SchedulerBiasLevel::MinorUrsa => 2,
            SchedulerBiasLevel::LeanUrsa => 3,
            SchedulerBiasLevel::LeanToro => 4,
            SchedulerBiasLevel::MinorToro => 5,
            SchedulerBiasLevel::MajorToro => 6,
        }
    }

    /// Map into the composite's five-level system. LEAN_* levels collapse to
    /// the nearest MINOR band, which is the closest composite equivalent.
    pub fn to_composite(&self) -> BiasLevel {
        match self {
            SchedulerBiasLevel::MajorUrsa => BiasLevel::UrsaMajor,
            SchedulerBiasLevel::MinorUrsa | SchedulerBiasLevel::LeanUrsa => BiasLevel::UrsaMinor,
            SchedulerBiasLevel::LeanToro | SchedulerBiasLevel::MinorToro => BiasLevel::ToroMinor,
            SchedulerBiasLevel::MajorToro => BiasLevel::ToroMajor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerBiasLevel::MajorUrsa => "MAJOR_URSA",
            SchedulerBiasLevel::MinorUrsa => "MINOR_URSA",
            SchedulerBiasLevel::LeanUrsa => "LEAN_URSA",
            SchedulerBiasLevel::LeanToro => "LEAN_TORO",
            SchedulerBiasLevel::MinorToro => "MINOR_TORO",
            SchedulerBiasLevel::MajorToro => "MAJOR_TORO",
        }
    }
}

impl FromStr for SchedulerBiasLevel {
    type Err = BiasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(' ', "_").as_str() {
            "MAJOR_URSA" => Ok(SchedulerBiasLevel::MajorUrsa),
            "MINOR_URSA" => Ok(SchedulerBiasLevel::MinorUrsa),
            "LEAN_URSA" => Ok(SchedulerBiasLevel::LeanUrsa),
            "LEAN_TORO" => Ok(SchedulerBiasLevel::LeanToro),
            "MINOR_TORO" => Ok(SchedulerBiasLevel::MinorToro),
            "MAJOR_TORO" => Ok(SchedulerBiasLevel::MajorToro),
            other => Err(BiasError::UnknownBiasLevel(other.to_string())),
        }
    }
}

/// Composite confidence from the active factor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_active_count(count: usize) -> Self {
        if count >= 6 {
            Confidence::High
        } else if count >= 4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

/// How a reading's source timestamp was derived. `Fallback` means the
/// ingestor could not find an authoritative timestamp in the payload and
/// used wall-clock time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    UpdatedAt,
    Timestamp,
    ReceivedAt,
    Fallback,
}

impl TimestampSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampSource::UpdatedAt => "updated_at",
            TimestampSource::Timestamp => "timestamp",
            TimestampSource::ReceivedAt => "received_at",
            TimestampSource::Fallback => "fallback",
        }
    }
}

/// One normalized indicator observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorReading {
    pub factor_id: String,
    pub score: f64,
    pub signal: BiasLevel,
    #[serde(default)]
    pub detail: String,
    /// Source timestamp: when the underlying data was produced, not when
    /// it was ingested.
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl FactorReading {
    pub fn new(
        factor_id: &str,
        score: f64,
        detail: String,
        timestamp: DateTime<Utc>,
        source: &str,
    ) -> Self {
        let score = score.clamp(-1.0, 1.0);
        Self {
            factor_id: factor_id.to_string(),
            score,
            signal: BiasLevel::from_score(score),
            detail,
            timestamp,
            source: source.to_string(),
            raw_data: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_raw_data(mut self, raw_data: serde_json::Value) -> Self {
        self.raw_data = raw_data;
        self
    }

    pub fn with_timestamp_source(mut self, source: TimestampSource) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::json!({});
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(
                "timestamp_source".to_string(),
                serde_json::Value::String(source.as_str().to_string()),
            );
        }
        self
    }

    /// Typed accessor for the timestamp provenance recorded in metadata.
    pub fn timestamp_source(&self) -> Option<TimestampSource> {
        match self.metadata.get("timestamp_source").and_then(|v| v.as_str()) {
            Some("updated_at") => Some(TimestampSource::UpdatedAt),
            Some("timestamp") => Some(TimestampSource::Timestamp),
            Some("received_at") => Some(TimestampSource::ReceivedAt),
            Some("fallback") => Some(TimestampSource::Fallback),
            _ => None,
        }
    }

    pub fn is_unverifiable(&self) -> bool {
        self.timestamp_source() == Some(TimestampSource::Fallback)
    }
}

/// Snapshot of the breaker projection applied to a composite result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerProjection {
    pub active: bool,
    pub trigger: String,
    pub scoring_modifier: f64,
    pub bias_cap: Option<SchedulerBiasLevel>,
    pub bias_floor: Option<SchedulerBiasLevel>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub decay_fade: f64,
}

/// Active operator override loaded from the KV store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasOverride {
    pub level: BiasLevel,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

/// The fused output of the composite bias engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub composite_score: f64,
    pub bias_level: BiasLevel,
    pub bias_numeric: i32,
    /// Latest reading per factor in the static config; None when a factor
    /// has never been observed. BTreeMap keeps serialized JSON canonical.
    pub factors: BTreeMap<String, Option<FactorReading>>,
    pub active_factors: Vec<String>,
    pub stale_factors: Vec<String>,
    pub velocity_multiplier: f64,
    #[serde(rename = "override")]
    pub override_level: Option<BiasLevel>,
    pub override_expires: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub confidence: Confidence,
    #[serde(default)]
    pub unverifiable_factors: Vec<String>,
    #[serde(default)]
    pub circuit_breaker: Option<BreakerProjection>,
}

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges_inclusive_low() {
        assert_eq!(BiasLevel::from_score(0.60), BiasLevel::ToroMajor);
        assert_eq!(BiasLevel::from_score(0.20), BiasLevel::ToroMinor);
        assert_eq!(BiasLevel::from_score(0.1999), BiasLevel::Neutral);
        assert_eq!(BiasLevel::from_score(-0.20), BiasLevel::Neutral);
        assert_eq!(BiasLevel::from_score(-0.2001), BiasLevel::UrsaMinor);
        assert_eq!(BiasLevel::from_score(-0.60), BiasLevel::UrsaMinor);
        assert_eq!(BiasLevel::from_score(-0.6001), BiasLevel::UrsaMajor);
    }

    #[test]
    fn test_numeric_round_trip() {
        for n in 1..=5 {
            let level = BiasLevel::from_numeric(n).unwrap();
            assert_eq!(level.numeric(), n);
        }
        assert!(BiasLevel::from_numeric(0).is_none());
        assert!(BiasLevel::from_numeric(6).is_none());
    }

    #[test]
    fn test_scheduler_level_mapping() {
        assert_eq!(
            SchedulerBiasLevel::LeanToro.to_composite(),
            BiasLevel::ToroMinor
        );
        assert_eq!(
            SchedulerBiasLevel::LeanUrsa.to_composite(),
            BiasLevel::UrsaMinor
        );
        assert_eq!(
            SchedulerBiasLevel::MajorToro.to_composite(),
            BiasLevel::ToroMajor
        );
        assert_eq!(
            "MINOR_TORO".parse::<SchedulerBiasLevel>().unwrap(),
            SchedulerBiasLevel::MinorToro
        );
    }

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(Confidence::from_active_count(6), Confidence::High);
        assert_eq!(Confidence::from_active_count(5), Confidence::Medium);
        assert_eq!(Confidence::from_active_count(4), Confidence::Medium);
        assert_eq!(Confidence::from_active_count(3), Confidence::Low);
        assert_eq!(Confidence::from_active_count(0), Confidence::Low);
    }

    #[test]
    fn test_reading_clamps_score() {
        let r = FactorReading::new("vix_regime", 1.7, "test".into(), Utc::now(), "yfinance");
        assert_eq!(r.score, 1.0);
        assert_eq!(r.signal, BiasLevel::ToroMajor);
    }

    #[test]
    fn test_timestamp_source_accessor() {
        let r = FactorReading::new("pcr", 0.1, "".into(), Utc::now(), "tradingview")
            .with_timestamp_source(TimestampSource::Fallback);
        assert!(r.is_unverifiable());

        let r2 = FactorReading::new("pcr", 0.1, "".into(), Utc::now(), "tradingview");
        assert!(!r2.is_unverifiable());
    }

    #[test]
    fn test_bias_level_serde_names() {
        let json = serde_json::to_string(&BiasLevel::UrsaMajor).unwrap();
        assert_eq!(json, "\"URSA_MAJOR\"");
        let back: BiasLevel = serde_json::from_str("\"TORO_MINOR\"").unwrap();
        assert_eq!(back, BiasLevel::ToroMinor);
    }
}
