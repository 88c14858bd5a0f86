use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::env;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub redis_url: String,
    pub database_url: String,
    /// Shared bearer token for webhook ingress. Empty disables auth
    /// (local development only).
    pub api_token: Option<String>,
    pub fred_api_key: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub savita_reading: Option<f64>,
    pub savita_date: Option<DateTime<Utc>>,
    pub scanner_cooldown_minutes: i64,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let savita_reading = match env::var("SAVITA_READING") {
            Ok(raw) => Some(
                raw.parse::<f64>()
                    .context("SAVITA_READING must be a number")?,
            ),
            Err(_) => None,
        };
        let savita_date = env::var("SAVITA_DATE")
            .ok()
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:biasdesk.db".to_string()),
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            fred_api_key: env::var("FRED_API_KEY").ok().filter(|k| !k.is_empty()),
            discord_webhook_url: env::var("DISCORD_WEBHOOK_URL").ok(),
            savita_reading,
            savita_date,
            scanner_cooldown_minutes: env::var("SCANNER_COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "240".to_string())
                .parse()
                .context("SCANNER_COOLDOWN_MINUTES must be an integer")?,
        };

        if config.api_token.is_none() {
            tracing::warn!("API_TOKEN not set; webhook ingress is unauthenticated");
        }

        Ok(config)
    }
}
