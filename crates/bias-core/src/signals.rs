use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BiasError;
use crate::types::{BiasLevel, Confidence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = BiasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(BiasError::InvalidData(format!("unknown direction {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    GoldenTouch,
    TwoCloseVolume,
    PullbackEntry,
    ZoneUpgrade,
    TrappedLongs,
    TrappedShorts,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::GoldenTouch => "GOLDEN_TOUCH",
            SignalType::TwoCloseVolume => "TWO_CLOSE_VOLUME",
            SignalType::PullbackEntry => "PULLBACK_ENTRY",
            SignalType::ZoneUpgrade => "ZONE_UPGRADE",
            SignalType::TrappedLongs => "TRAPPED_LONGS",
            SignalType::TrappedShorts => "TRAPPED_SHORTS",
        }
    }

    /// Type-specific base priority before any confluence boost.
    pub fn base_priority(&self) -> i32 {
        match self {
            SignalType::GoldenTouch => 100,
            SignalType::TwoCloseVolume => 80,
            SignalType::TrappedLongs | SignalType::TrappedShorts => 80,
            SignalType::PullbackEntry => 50,
            SignalType::ZoneUpgrade => 40,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CTA trend phase from the 20/50/120 SMA stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtaZone {
    MaxLong,
    Transition,
    DeLeveraging,
    Waterfall,
    Capitulation,
    Unknown,
}

impl CtaZone {
    /// Zone hierarchy, higher = more bullish.
    pub fn rank(&self) -> i32 {
        match self {
            CtaZone::Capitulation => 0,
            CtaZone::Waterfall => 1,
            CtaZone::DeLeveraging => 2,
            CtaZone::Transition => 3,
            CtaZone::MaxLong => 4,
            CtaZone::Unknown => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CtaZone::MaxLong => "MAX_LONG",
            CtaZone::Transition => "TRANSITION",
            CtaZone::DeLeveraging => "DE_LEVERAGING",
            CtaZone::Waterfall => "WATERFALL",
            CtaZone::Capitulation => "CAPITULATION",
            CtaZone::Unknown => "UNKNOWN",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, CtaZone::MaxLong | CtaZone::Transition)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(
            self,
            CtaZone::Waterfall | CtaZone::Capitulation | CtaZone::DeLeveraging
        )
    }
}

impl fmt::Display for CtaZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CtaZone {
    type Err = BiasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MAX_LONG" => Ok(CtaZone::MaxLong),
            "TRANSITION" => Ok(CtaZone::Transition),
            "DE_LEVERAGING" => Ok(CtaZone::DeLeveraging),
            "WATERFALL" => Ok(CtaZone::Waterfall),
            "CAPITULATION" => Ok(CtaZone::Capitulation),
            "UNKNOWN" => Ok(CtaZone::Unknown),
            other => Err(BiasError::InvalidData(format!("unknown cta zone {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryWindow {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSetup {
    pub entry: f64,
    pub entry_window: EntryWindow,
    pub stop: f64,
    pub t1: f64,
    pub t2: f64,
    pub rr_ratio: f64,
    pub invalidation_level: Option<f64>,
    pub invalidation_reason: Option<String>,
}

/// Which anchors produced the setup levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupContext {
    pub stop_anchor: String,
    pub t1_anchor: String,
    pub t2_anchor: String,
    pub stop_mult: f64,
    pub target_mult: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confluence {
    pub count: usize,
    #[serde(default)]
    pub signal_types: Vec<SignalType>,
    #[serde(default)]
    pub boost: i32,
    #[serde(default)]
    pub combo: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Sector ETF alignment attached during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorWind {
    pub sector: String,
    pub etf: Option<String>,
    pub etf_zone: Option<CtaZone>,
    pub alignment: String,
}

/// Composite-bias alignment attached during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasAlignment {
    pub bias: BiasLevel,
    pub alignment: String,
    pub conviction_mult: f64,
}

/// A typed trade signal produced by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub signal_type: SignalType,
    pub direction: Direction,
    pub priority: i32,
    pub description: String,
    pub cta_zone: CtaZone,
    pub setup: SignalSetup,
    pub setup_context: SetupContext,
    /// Indicator snapshot at the signal bar.
    pub context: serde_json::Value,
    pub confidence: Confidence,
    #[serde(default)]
    pub confluence: Option<Confluence>,
    #[serde(default)]
    pub sector_wind: Option<SectorWind>,
    #[serde(default)]
    pub bias_alignment: Option<BiasAlignment>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Terminal outcome of a tracked signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    HitStop,
    HitT1,
    HitT2,
    Expired,
}

impl SignalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOutcome::HitStop => "hit_stop",
            SignalOutcome::HitT1 => "hit_t1",
            SignalOutcome::HitT2 => "hit_t2",
            SignalOutcome::Expired => "expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_ranking() {
        assert!(CtaZone::MaxLong.rank() > CtaZone::Transition.rank());
        assert!(CtaZone::Transition.rank() > CtaZone::DeLeveraging.rank());
        assert!(CtaZone::DeLeveraging.rank() > CtaZone::Waterfall.rank());
        assert!(CtaZone::Waterfall.rank() > CtaZone::Capitulation.rank());
        assert_eq!(CtaZone::Unknown.rank(), -1);
    }

    #[test]
    fn test_base_priorities() {
        assert_eq!(SignalType::GoldenTouch.base_priority(), 100);
        assert_eq!(SignalType::TwoCloseVolume.base_priority(), 80);
        assert_eq!(SignalType::ZoneUpgrade.base_priority(), 40);
    }

    #[test]
    fn test_signal_type_serde() {
        let json = serde_json::to_string(&SignalType::GoldenTouch).unwrap();
        assert_eq!(json, "\"GOLDEN_TOUCH\"");
        let back: SignalType = serde_json::from_str("\"TRAPPED_SHORTS\"").unwrap();
        assert_eq!(back, SignalType::TrappedShorts);
    }
}
