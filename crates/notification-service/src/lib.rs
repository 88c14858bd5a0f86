//! Operator notifications over a Discord webhook, with per-alert
//! cool-downs so repeated conditions don't flap.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Minimum seconds between two deliveries of the same alert key.
pub const ALERT_COOLDOWN_SECS: i64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    fn embed_color(&self) -> u32 {
        match self {
            AlertSeverity::Info => 0x3498DB,
            AlertSeverity::Warning => 0xFFA500,
            AlertSeverity::Critical => 0xE74C3C,
        }
    }
}

pub struct Notifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
    cooldowns: DashMap<String, DateTime<Utc>>,
}

impl Notifier {
    /// `webhook_url` may be empty/None; notifications then log and drop.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            client: reqwest::Client::new(),
            cooldowns: DashMap::new(),
        }
    }

    /// True when the alert key is outside its cool-down window; claims the
    /// window as a side effect.
    pub fn claim_cooldown(&self, key: &str) -> bool {
        let now = Utc::now();
        if let Some(last) = self.cooldowns.get(key) {
            if now - *last < Duration::seconds(ALERT_COOLDOWN_SECS) {
                return false;
            }
        }
        self.cooldowns.insert(key.to_string(), now);
        true
    }

    /// Send a titled alert; suppressed while the key is cooling down.
    pub async fn send_alert(&self, key: &str, title: &str, message: &str, severity: AlertSeverity) {
        if !self.claim_cooldown(key) {
            tracing::debug!("Alert {} suppressed by cooldown", key);
            return;
        }
        self.send_now(title, message, severity).await;
    }

    /// Send without cool-down accounting (startup notices, operator acks).
    pub async fn send_now(&self, title: &str, message: &str, severity: AlertSeverity) {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Notification webhook not set, skipping: {}", title);
            return;
        };

        let payload = serde_json::json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": severity.embed_color(),
                "timestamp": Utc::now().to_rfc3339(),
            }]
        });

        match self
            .client
            .post(url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => tracing::warn!("Notification webhook failed: HTTP {}", resp.status()),
            Err(e) => tracing::warn!("Notification delivery failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_claims_once() {
        let notifier = Notifier::new(None);
        assert!(notifier.claim_cooldown("bias_level_changed"));
        assert!(!notifier.claim_cooldown("bias_level_changed"));
        // Distinct keys have independent windows
        assert!(notifier.claim_cooldown("mass_staleness"));
    }

    #[tokio::test]
    async fn test_send_without_webhook_is_noop() {
        let notifier = Notifier::new(Some(String::new()));
        notifier
            .send_now("Test", "no webhook configured", AlertSeverity::Info)
            .await;
    }
}
