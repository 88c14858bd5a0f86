//! Process-wide fan-out hub. Components publish typed events; subscribers
//! (WebSocket clients, the dispatcher, tests) receive them over a bounded
//! broadcast channel. Lagging subscribers drop the oldest messages.

use bias_core::{BiasLevel, CircuitBreakerState, Confidence, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 2048;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasUpdatePayload {
    pub bias_level: BiasLevel,
    pub bias_numeric: i32,
    pub composite_score: f64,
    pub confidence: Confidence,
    #[serde(rename = "override")]
    pub override_level: Option<BiasLevel>,
    #[serde(default)]
    pub changed_from: Option<BiasLevel>,
}

/// Typed messages delivered to connected subscribers. Every message
/// carries a UTC ISO-8601 timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    #[serde(rename = "NEW_SIGNAL")]
    NewSignal {
        signal: Box<Signal>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "BIAS_UPDATE")]
    BiasUpdate {
        payload: BiasUpdatePayload,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "circuit_breaker")]
    CircuitBreaker {
        state: CircuitBreakerState,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "circuit_breaker_pending_reset")]
    CircuitBreakerPendingReset {
        state: CircuitBreakerState,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "FLOW_UPDATE")]
    FlowUpdate {
        tickers_updated: Vec<String>,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "POSITION_UPDATE")]
    PositionUpdate {
        symbol: String,
        action: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Publish to all current subscribers. A bus with no subscribers is
    /// not an error.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(BusEvent::FlowUpdate {
            tickers_updated: vec!["NVDA".to_string()],
            count: 1,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            BusEvent::FlowUpdate { count, .. } => assert_eq!(count, 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        bus.publish(BusEvent::PositionUpdate {
            symbol: "SPY".to_string(),
            action: "CLOSE".to_string(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_event_type_tags() {
        let event = BusEvent::CircuitBreaker {
            state: CircuitBreakerState::default(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "circuit_breaker");

        let event = BusEvent::BiasUpdate {
            payload: BiasUpdatePayload {
                bias_level: BiasLevel::Neutral,
                bias_numeric: 3,
                composite_score: 0.0,
                confidence: Confidence::Low,
                override_level: None,
                changed_from: None,
            },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BIAS_UPDATE");
    }
}
