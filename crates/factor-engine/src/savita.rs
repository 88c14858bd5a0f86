//! Savita / BofA Sell Side Indicator: manually entered monthly reading.
//! Contrarian: high sell-side bullishness scores bearish. Returns nothing
//! when no reading is configured.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};

use crate::{FactorIngestor, IngestorContext};

pub struct SavitaIngestor {
    ctx: Arc<IngestorContext>,
}

impl SavitaIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_savita(reading: f64) -> f64 {
    let score = if reading >= 65.0 {
        -0.8
    } else if reading >= 60.0 {
        -0.4
    } else if reading >= 55.0 {
        -0.1
    } else if reading >= 50.0 {
        0.1
    } else if reading >= 45.0 {
        0.4
    } else {
        0.8
    };
    clamp_score(score)
}

#[async_trait]
impl FactorIngestor for SavitaIngestor {
    fn factor_id(&self) -> &'static str {
        "savita"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let setting = self.ctx.savita?;
        let score = score_savita(setting.reading);
        let detail = format!("BofA Sell Side Indicator {:.1}", setting.reading);

        Some(
            FactorReading::new(self.factor_id(), score, detail, setting.as_of, "manual")
                .with_raw_data(serde_json::json!({
                    "value": setting.reading,
                    "date": setting.as_of.to_rfc3339(),
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrarian_bands() {
        assert_eq!(score_savita(70.0), -0.8);
        assert_eq!(score_savita(62.0), -0.4);
        assert_eq!(score_savita(57.0), -0.1);
        assert_eq!(score_savita(52.0), 0.1);
        assert_eq!(score_savita(47.0), 0.4);
        assert_eq!(score_savita(40.0), 0.8);
    }
}
