//! Per-ticker indicator panel for the CTA scanner.

use bias_core::Bar;

/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

/// SMA aligned to the input: None until `period` values are available.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }
    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = Some(finite_or(sum / period as f64, 0.0));
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        result[i] = Some(finite_or(sum / period as f64, 0.0));
    }
    result
}

/// Wilder ATR over the full series; last value returned.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let mut true_ranges = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        true_ranges.push(high_low.max(high_close).max(low_close));
    }

    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    for tr in &true_ranges[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
    }
    Some(finite_or(atr, 0.0))
}

/// Wilder RSI; last value returned.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    Some(finite_or(rsi, 50.0))
}

/// Wilder ADX; last value returned.
pub fn adx(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < 2 * period + 1 {
        return None;
    }

    let n = bars.len() - 1;
    let mut trs = Vec::with_capacity(n);
    let mut plus_dms = Vec::with_capacity(n);
    let mut minus_dms = Vec::with_capacity(n);

    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        trs.push(high_low.max(high_close).max(low_close));

        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;
        plus_dms.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dms.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    let mut smoothed_tr: f64 = trs[..period].iter().sum();
    let mut smoothed_plus: f64 = plus_dms[..period].iter().sum();
    let mut smoothed_minus: f64 = minus_dms[..period].iter().sum();

    let dx_at = |tr: f64, plus: f64, minus: f64| -> f64 {
        if tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * plus / tr;
        let minus_di = 100.0 * minus / tr;
        if plus_di + minus_di == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di)
        }
    };

    let mut dxs = vec![dx_at(smoothed_tr, smoothed_plus, smoothed_minus)];
    for i in period..n {
        smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + trs[i];
        smoothed_plus = smoothed_plus - smoothed_plus / period as f64 + plus_dms[i];
        smoothed_minus = smoothed_minus - smoothed_minus / period as f64 + minus_dms[i];
        dxs.push(dx_at(smoothed_tr, smoothed_plus, smoothed_minus));
    }

    if dxs.len() < period {
        return None;
    }
    let mut adx = dxs[..period].iter().sum::<f64>() / period as f64;
    for dx in &dxs[period..] {
        adx = (adx * (period - 1) as f64 + dx) / period as f64;
    }
    Some(finite_or(adx, 0.0))
}

/// Rolling 20-bar volume-weighted typical price.
pub fn vwap(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let mut pv = 0.0;
    let mut volume = 0.0;
    for bar in window {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        pv += typical * bar.volume;
        volume += bar.volume;
    }
    if volume == 0.0 {
        return None;
    }
    Some(finite_or(pv / volume, 0.0))
}

fn rolling_high(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period {
        return None;
    }
    bars[bars.len() - period..]
        .iter()
        .map(|b| b.high)
        .fold(None, |acc: Option<f64>, h| {
            Some(acc.map_or(h, |a| a.max(h)))
        })
}

fn volume_avg(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period {
        return None;
    }
    let sum: f64 = bars[bars.len() - period..].iter().map(|b| b.volume).sum();
    let avg = sum / period as f64;
    if avg == 0.0 {
        None
    } else {
        Some(avg)
    }
}

/// Everything the signal rules look at for one ticker's latest bar.
#[derive(Debug, Clone)]
pub struct IndicatorPanel {
    pub close: f64,
    pub low: f64,
    pub volume: f64,

    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma120: Option<f64>,
    pub sma200: Option<f64>,

    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub vwap20: Option<f64>,

    /// Volume vs 30-day average (breakout confirmation).
    pub vol_ratio: Option<f64>,
    /// Volume vs 20-day average (trapped-trader RVOL).
    pub rvol: Option<f64>,

    pub rolling_high_60: Option<f64>,
    pub correction_pct: Option<f64>,
    pub days_above_120: usize,

    pub dist_to_20_pct: Option<f64>,
    pub dist_to_50_pct: Option<f64>,
    pub dist_to_120_pct: Option<f64>,
    pub prev_dist_to_20_pct: Option<f64>,

    pub close_above_50: bool,
    pub prev1_close_above_50: bool,
    pub prev2_close_above_50: bool,
}

impl IndicatorPanel {
    /// Build the panel from daily bars, oldest first. Needs at least a few
    /// bars; individual indicators go None when their window is short.
    pub fn compute(bars: &[Bar]) -> Option<Self> {
        if bars.len() < 3 {
            return None;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let latest = bars.last()?;
        let n = bars.len();

        let sma20_series = sma_series(&closes, 20);
        let sma50_series = sma_series(&closes, 50);
        let sma120_series = sma_series(&closes, 120);
        let sma200_series = sma_series(&closes, 200);

        let sma20 = sma20_series[n - 1];
        let sma50 = sma50_series[n - 1];
        let sma120 = sma120_series[n - 1];
        let sma200 = sma200_series[n - 1];

        let dist_pct = |price: f64, sma: Option<f64>| -> Option<f64> {
            sma.filter(|s| *s != 0.0).map(|s| (price - s) / s * 100.0)
        };

        let rolling_high_60 = rolling_high(bars, 60);
        let correction_pct = rolling_high_60
            .filter(|h| *h != 0.0)
            .map(|h| (h - latest.close) / h * 100.0);

        // Consecutive closes above the 120 SMA, ending at the latest bar.
        let mut days_above_120 = 0;
        for i in (0..n).rev() {
            match sma120_series[i] {
                Some(sma) if closes[i] > sma => days_above_120 += 1,
                _ => break,
            }
        }

        let above_50_at = |i: usize| -> bool {
            sma50_series[i].map(|s| closes[i] > s).unwrap_or(false)
        };

        let prev_close = closes[n - 2];
        let prev_dist_to_20_pct = dist_pct(prev_close, sma20_series[n - 2]);

        Some(Self {
            close: latest.close,
            low: latest.low,
            volume: latest.volume,
            sma20,
            sma50,
            sma120,
            sma200,
            atr: atr(bars, 14),
            rsi: rsi(&closes, 14),
            adx: adx(bars, 14),
            vwap20: vwap(bars, 20),
            vol_ratio: volume_avg(bars, 30).map(|avg| latest.volume / avg),
            rvol: volume_avg(bars, 20).map(|avg| latest.volume / avg),
            rolling_high_60,
            correction_pct,
            days_above_120,
            dist_to_20_pct: dist_pct(latest.close, sma20),
            dist_to_50_pct: dist_pct(latest.close, sma50),
            dist_to_120_pct: dist_pct(latest.close, sma120),
            prev_dist_to_20_pct,
            close_above_50: above_50_at(n - 1),
            prev1_close_above_50: above_50_at(n - 2),
            prev2_close_above_50: above_50_at(n - 3),
        })
    }

    /// Previous bar's SMA triple, for the zone-transition rule.
    pub fn prev_smas(bars: &[Bar]) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let n = closes.len();
        if n < 2 {
            return (None, None, None, None);
        }
        (
            Some(closes[n - 2]),
            sma_series(&closes, 20)[n - 2],
            sma_series(&closes, 50)[n - 2],
            sma_series(&closes, 120)[n - 2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bar(i: usize, close: f64) -> Bar {
        Bar {
            timestamp: Utc::now() - Duration::days(300 - i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000_000.0,
        }
    }

    #[test]
    fn test_sma_series_alignment() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let smas = sma_series(&values, 3);
        assert_eq!(smas[0], None);
        assert_eq!(smas[1], None);
        assert_eq!(smas[2], Some(2.0));
        assert_eq!(smas[4], Some(4.0));
    }

    #[test]
    fn test_rsi_range() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_rsi_uptrend_high() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn test_atr_positive() {
        let bars: Vec<Bar> = (0..40).map(|i| bar(i, 100.0 + i as f64 * 0.5)).collect();
        let value = atr(&bars, 14).unwrap();
        assert!(value > 0.0);
    }

    #[test]
    fn test_adx_needs_history() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, 100.0)).collect();
        assert!(adx(&bars, 14).is_none());

        let bars: Vec<Bar> = (0..60).map(|i| bar(i, 100.0 + i as f64)).collect();
        let value = adx(&bars, 14).unwrap();
        // Strong one-way trend produces a high ADX
        assert!(value > 25.0, "adx was {value}");
    }

    #[test]
    fn test_days_above_120_streak() {
        // 130 rising bars: everything above the 120 SMA once it exists
        let bars: Vec<Bar> = (0..200).map(|i| bar(i, 100.0 + i as f64)).collect();
        let panel = IndicatorPanel::compute(&bars).unwrap();
        assert!(panel.days_above_120 >= 50);
        assert!(panel.sma120.is_some());
        assert!(panel.sma200.is_none());
    }

    #[test]
    fn test_panel_distances() {
        let bars: Vec<Bar> = (0..60).map(|i| bar(i, 100.0)).collect();
        let panel = IndicatorPanel::compute(&bars).unwrap();
        assert!(panel.dist_to_20_pct.unwrap().abs() < 1e-9);
        assert_eq!(panel.vol_ratio, Some(1.0));
        assert_eq!(panel.rvol, Some(1.0));
    }
}
