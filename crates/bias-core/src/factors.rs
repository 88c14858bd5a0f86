use serde::{Deserialize, Serialize};

/// Cadence family a factor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorTimeframe {
    Intraday,
    Swing,
    Macro,
}

/// Static per-factor configuration. Weights across the table sum to ~1.0
/// but are renormalized over the active subset on every compute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorConfig {
    pub weight: f64,
    pub staleness_hours: u32,
    pub timeframe: FactorTimeframe,
    pub description: &'static str,
}

/// The closed factor set. Order matters only for display; lookups go
/// through [`factor_config`].
pub const FACTOR_CONFIG: &[(&str, FactorConfig)] = &[
    // Intraday: fast-moving indicators that change through the session.
    (
        "vix_term",
        FactorConfig {
            weight: 0.07,
            staleness_hours: 4,
            timeframe: FactorTimeframe::Intraday,
            description: "VIX vs VIX3M - near-term fear vs longer-term expectations",
        },
    ),
    (
        "tick_breadth",
        FactorConfig {
            weight: 0.06,
            staleness_hours: 4,
            timeframe: FactorTimeframe::Intraday,
            description: "Intraday TICK readings - buying/selling pressure",
        },
    ),
    (
        "vix_regime",
        FactorConfig {
            weight: 0.05,
            staleness_hours: 4,
            timeframe: FactorTimeframe::Intraday,
            description: "Absolute VIX level - overall market fear/complacency",
        },
    ),
    (
        "spy_trend_intraday",
        FactorConfig {
            weight: 0.05,
            staleness_hours: 4,
            timeframe: FactorTimeframe::Intraday,
            description: "SPY price vs 9 EMA - short-term momentum",
        },
    ),
    (
        "breadth_momentum",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 24,
            timeframe: FactorTimeframe::Intraday,
            description: "RSP/SPY ratio rate of change - breadth improving or deteriorating",
        },
    ),
    (
        "options_sentiment",
        FactorConfig {
            weight: 0.02,
            staleness_hours: 8,
            timeframe: FactorTimeframe::Intraday,
            description: "UW Market Tide - institutional options flow sentiment",
        },
    ),
    // Swing: multi-day trend indicators.
    (
        "credit_spreads",
        FactorConfig {
            weight: 0.08,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Swing,
            description: "HYG vs TLT ratio - credit market risk appetite",
        },
    ),
    (
        "market_breadth",
        FactorConfig {
            weight: 0.08,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Swing,
            description: "RSP vs SPY ratio - equal-weight vs cap-weight divergence",
        },
    ),
    (
        "sector_rotation",
        FactorConfig {
            weight: 0.06,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Swing,
            description: "XLK/XLY vs XLP/XLU - offensive vs defensive flows",
        },
    ),
    (
        "spy_200sma_distance",
        FactorConfig {
            weight: 0.07,
            staleness_hours: 24,
            timeframe: FactorTimeframe::Swing,
            description: "SPY percent distance from 200-day SMA - trend strength",
        },
    ),
    (
        "high_yield_oas",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Swing,
            description: "ICE BofA HY OAS - precise credit stress gauge",
        },
    ),
    (
        "dollar_smile",
        FactorConfig {
            weight: 0.02,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Swing,
            description: "DXY trend - risk-on weakness vs risk-off strength",
        },
    ),
    (
        "put_call_ratio",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 72,
            timeframe: FactorTimeframe::Swing,
            description: "CBOE equity put/call ratio - contrarian sentiment gauge",
        },
    ),
    (
        "polygon_pcr",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 8,
            timeframe: FactorTimeframe::Swing,
            description: "SPY put/call volume ratio - automated flow sentiment",
        },
    ),
    (
        "iv_skew",
        FactorConfig {
            weight: 0.02,
            staleness_hours: 8,
            timeframe: FactorTimeframe::Swing,
            description: "SPY IV skew - put vs call implied volatility (NTM, 7-45 DTE)",
        },
    ),
    // Macro: long-term economic and structural indicators.
    (
        "yield_curve",
        FactorConfig {
            weight: 0.05,
            staleness_hours: 72,
            timeframe: FactorTimeframe::Macro,
            description: "10Y-2Y Treasury spread - recession predictor",
        },
    ),
    (
        "initial_claims",
        FactorConfig {
            weight: 0.05,
            staleness_hours: 168,
            timeframe: FactorTimeframe::Macro,
            description: "Weekly initial jobless claims - labor market health",
        },
    ),
    (
        "sahm_rule",
        FactorConfig {
            weight: 0.04,
            staleness_hours: 168,
            timeframe: FactorTimeframe::Macro,
            description: "Sahm Rule - real-time recession probability",
        },
    ),
    (
        "copper_gold_ratio",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Macro,
            description: "COPX/GLD - economic activity vs safety demand",
        },
    ),
    (
        "dxy_trend",
        FactorConfig {
            weight: 0.05,
            staleness_hours: 48,
            timeframe: FactorTimeframe::Macro,
            description: "DXY 5d trend + SMA20 context - strong USD is risk-off for equities",
        },
    ),
    (
        "excess_cape",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 168,
            timeframe: FactorTimeframe::Macro,
            description: "Excess CAPE yield - valuation risk level",
        },
    ),
    (
        "ism_manufacturing",
        FactorConfig {
            weight: 0.03,
            staleness_hours: 720,
            timeframe: FactorTimeframe::Macro,
            description: "Manufacturing employment trend - leading economic indicator",
        },
    ),
    (
        "savita",
        FactorConfig {
            weight: 0.02,
            staleness_hours: 1080,
            timeframe: FactorTimeframe::Macro,
            description: "BofA Sell Side Indicator - monthly contrarian sentiment",
        },
    ),
];

pub fn factor_config(factor_id: &str) -> Option<&'static FactorConfig> {
    FACTOR_CONFIG
        .iter()
        .find(|(id, _)| *id == factor_id)
        .map(|(_, cfg)| cfg)
}

pub fn factor_ids() -> impl Iterator<Item = &'static str> {
    FACTOR_CONFIG.iter().map(|(id, _)| *id)
}

pub fn factor_ids_for(timeframe: FactorTimeframe) -> Vec<&'static str> {
    FACTOR_CONFIG
        .iter()
        .filter(|(_, cfg)| cfg.timeframe == timeframe)
        .map(|(id, _)| *id)
        .collect()
}

/// Validate the static table: every weight non-negative and the sum usable
/// as a renormalization denominator.
pub fn validate_factor_table() -> Result<(), crate::error::BiasError> {
    let mut sum = 0.0;
    for (id, cfg) in FACTOR_CONFIG {
        if cfg.weight < 0.0 {
            return Err(crate::error::BiasError::InvalidData(format!(
                "factor {} has negative weight",
                id
            )));
        }
        if cfg.staleness_hours == 0 {
            return Err(crate::error::BiasError::InvalidData(format!(
                "factor {} has zero staleness window",
                id
            )));
        }
        sum += cfg.weight;
    }
    if sum <= 0.0 {
        return Err(crate::error::BiasError::InvalidData(
            "factor weights sum to zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        validate_factor_table().unwrap();
    }

    #[test]
    fn test_closed_set_size() {
        assert_eq!(FACTOR_CONFIG.len(), 23);
        assert_eq!(factor_ids_for(FactorTimeframe::Intraday).len(), 6);
        assert_eq!(factor_ids_for(FactorTimeframe::Swing).len(), 9);
        assert_eq!(factor_ids_for(FactorTimeframe::Macro).len(), 8);
    }

    #[test]
    fn test_weights_sum_near_one() {
        let sum: f64 = FACTOR_CONFIG.iter().map(|(_, c)| c.weight).sum();
        assert!((sum - 1.0).abs() < 0.05, "weight sum {} drifted", sum);
    }

    #[test]
    fn test_lookup() {
        let cfg = factor_config("savita").unwrap();
        assert_eq!(cfg.staleness_hours, 1080);
        assert!(factor_config("unknown_factor").is_none());
    }
}
