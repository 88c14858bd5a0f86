//! Small rolling-window helpers over close series. The scanner has its own
//! full indicator panel; these cover what the factor scorers need.

use bias_core::Bar;

pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// SMA over the trailing `period` values, if enough data exists.
pub fn sma_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// EMA of the full series, seeded with the first value.
pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.is_empty() {
        return None;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = values[0];
    for value in &values[1..] {
        ema = (value - ema) * multiplier + ema;
    }
    Some(ema)
}

/// Percent change between the last value and the value `periods` back.
pub fn pct_change(values: &[f64], periods: usize) -> Option<f64> {
    if values.len() <= periods {
        return None;
    }
    let prior = values[values.len() - 1 - periods];
    if prior == 0.0 {
        return None;
    }
    Some((values[values.len() - 1] - prior) / prior * 100.0)
}

/// Elementwise ratio of two equally-trailing close series, truncated to the
/// shorter length from the back.
pub fn ratio_series(a: &[f64], b: &[f64]) -> Vec<f64> {
    let len = a.len().min(b.len());
    let a = &a[a.len() - len..];
    let b = &b[b.len() - len..];
    a.iter()
        .zip(b.iter())
        .filter(|(_, denom)| **denom != 0.0)
        .map(|(num, denom)| num / denom)
        .collect()
}

/// (current, sma20, pct deviation from sma20, 5d rate of change) for a
/// ratio series; the shared shape of the ratio-vs-trend factors.
pub struct RatioStats {
    pub current: f64,
    pub sma20: f64,
    pub pct_dev: f64,
    pub roc_5d: f64,
}

pub fn ratio_stats(ratio: &[f64]) -> Option<RatioStats> {
    let current = *ratio.last()?;
    let sma20 = sma_last(ratio, 20)?;
    if sma20 == 0.0 {
        return None;
    }
    let pct_dev = (current - sma20) / sma20 * 100.0;
    let roc_5d = pct_change(ratio, 5).unwrap_or(0.0);
    Some(RatioStats {
        current,
        sma20,
        pct_dev,
        roc_5d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_last() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma_last(&values, 3), Some(4.0));
        assert_eq!(sma_last(&values, 5), Some(3.0));
        assert_eq!(sma_last(&values, 6), None);
    }

    #[test]
    fn test_pct_change() {
        let values = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let roc = pct_change(&values, 5).unwrap();
        assert!((roc - 5.0).abs() < 1e-9);
        assert!(pct_change(&values, 6).is_none());
    }

    #[test]
    fn test_ratio_series_aligns_from_back() {
        let a = vec![2.0, 4.0, 6.0];
        let b = vec![1.0, 2.0, 2.0, 3.0];
        let ratio = ratio_series(&a, &b);
        assert_eq!(ratio, vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_ratio_stats() {
        let ratio: Vec<f64> = (0..25).map(|i| 1.0 + i as f64 * 0.01).collect();
        let stats = ratio_stats(&ratio).unwrap();
        assert!(stats.pct_dev > 0.0);
        assert!(stats.roc_5d > 0.0);
    }
}
