use super::*;
use bias_core::{
    BiasLevel, Confidence, CtaZone, Direction, EntryWindow, FactorReading, SetupContext, Signal,
    SignalSetup, SignalType,
};
use chrono::Utc;
use std::collections::BTreeMap;

fn sample_signal(symbol: &str) -> Signal {
    Signal {
        signal_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        symbol: symbol.to_string(),
        signal_type: SignalType::GoldenTouch,
        direction: Direction::Long,
        priority: 100,
        description: "First touch of 120 SMA after 60 days above.".to_string(),
        cta_zone: CtaZone::MaxLong,
        setup: SignalSetup {
            entry: 100.0,
            entry_window: EntryWindow {
                low: 98.0,
                high: 101.5,
            },
            stop: 96.5,
            t1: 103.0,
            t2: 106.0,
            rr_ratio: 1.7,
            invalidation_level: Some(95.0),
            invalidation_reason: Some("Close below 50 SMA".to_string()),
        },
        setup_context: SetupContext {
            stop_anchor: "SMA50 (96.75) - buffer".to_string(),
            t1_anchor: "0.5x reward".to_string(),
            t2_anchor: "3 ATR (MAX_LONG profile)".to_string(),
            stop_mult: 1.5,
            target_mult: 3.0,
        },
        context: serde_json::json!({"sma20": 99.0, "atr": 2.0}),
        confidence: Confidence::High,
        confluence: None,
        sector_wind: None,
        bias_alignment: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_db_creation() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();
    assert!(db.pool().acquire().await.is_ok());
}

#[tokio::test]
async fn test_signal_lifecycle() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();
    let signal = sample_signal("NVDA");

    db.insert_signal(&signal, None, 2, 10, false, None, None)
        .await
        .unwrap();

    let open = db.open_signals().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].symbol, "NVDA");
    assert_eq!(open[0].signal_type, "GOLDEN_TOUCH");

    db.close_signal(&signal.signal_id, SignalOutcome::HitT2, Some(106.0), Some(8), Some(1.7))
        .await
        .unwrap();

    let open = db.open_signals().await.unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_signal_payload_round_trip() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();
    let signal = sample_signal("AMD");
    db.insert_signal(&signal, Some(&serde_json::json!({"bias_level": "TORO_MINOR"})), 4, 15, true, Some(12), Some("FOMC"))
        .await
        .unwrap();

    let recent = db.recent_signals(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    let loaded: Signal = serde_json::from_value(recent[0].clone()).unwrap();
    assert_eq!(loaded.signal_id, signal.signal_id);
    assert_eq!(loaded.setup.t2, signal.setup.t2);
}

#[tokio::test]
async fn test_composite_history_insert() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();

    let mut factors = BTreeMap::new();
    factors.insert(
        "vix_regime".to_string(),
        Some(FactorReading::new(
            "vix_regime",
            0.2,
            "VIX at 15.0".to_string(),
            Utc::now(),
            "yfinance",
        )),
    );
    factors.insert("savita".to_string(), None);

    let result = bias_core::CompositeResult {
        composite_score: 0.41,
        bias_level: BiasLevel::ToroMinor,
        bias_numeric: 4,
        factors,
        active_factors: vec!["vix_regime".to_string()],
        stale_factors: vec!["savita".to_string()],
        velocity_multiplier: 1.0,
        override_level: None,
        override_expires: None,
        timestamp: Utc::now(),
        confidence: Confidence::Low,
        unverifiable_factors: vec![],
        circuit_breaker: None,
    };

    db.insert_composite(&result).await.unwrap();
    assert_eq!(db.composite_history_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_watchlist_add_remove() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();

    db.add_watchlist_ticker("nvda", Some("Technology")).await.unwrap();
    db.add_watchlist_ticker("JPM", Some("Financials")).await.unwrap();

    let list = db.watchlist().await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].symbol, "JPM");
    assert_eq!(list[1].symbol, "NVDA");

    db.remove_watchlist_ticker("JPM").await.unwrap();
    let list = db.watchlist().await.unwrap();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn test_factor_reading_insert() {
    let db = BiasDb::new("sqlite::memory:").await.unwrap();
    let reading = FactorReading::new(
        "credit_spreads",
        -0.4,
        "HYG/TLT below SMA20".to_string(),
        Utc::now(),
        "yfinance",
    );
    db.insert_factor_reading(&reading).await.unwrap();
}
