//! Indicator pipeline for the daily (and hourly) candle sequences.
//!
//! Every series returned here is index-aligned with its input: slot `i`
//! belongs to candle `i`, and leading slots stay `None` until the indicator's
//! warm-up window is satisfied.
//!
//! * EMA is seeded with the SMA of the first `period` values, then
//!   `α·price + (1−α)·prev` with `α = 2/(period+1)`.
//! * RSI and ATR use Wilder smoothing seeded with a simple mean.
//! * Bollinger width is `(upper − lower) / middle` over a population σ.

use statrs::statistics::Statistics;

use crate::services::strategies::Candle;

pub const EMA_FAST: usize = 21;
pub const EMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_DEV: f64 = 2.0;
pub const BB_WIDTH_AVG: usize = 20;
pub const VOLUME_AVG: usize = 20;
pub const RANGE_LOW_WINDOW: usize = 30;

/// Derived daily series, immutable once computed for a scan.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub bb_width: Vec<Option<f64>>,
    pub bb_width_avg: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
    pub range_low: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn compute(candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        // Bands that cannot be computed fall back to a flat zero width.
        let (bb_width, bb_width_avg) = match bollinger_width(&closes, BB_PERIOD, BB_STD_DEV) {
            Some(width) => {
                let avg = sma_opt(&width, BB_WIDTH_AVG);
                (width, avg)
            }
            None => (vec![Some(0.0); candles.len()], vec![Some(0.0); candles.len()]),
        };

        Self {
            ema_fast: ema(&closes, EMA_FAST),
            ema_slow: ema(&closes, EMA_SLOW),
            rsi: rsi(&closes, RSI_PERIOD),
            atr: atr(candles, ATR_PERIOD),
            bb_width,
            bb_width_avg,
            volume_avg: sma(&volumes, VOLUME_AVG),
            range_low: rolling_min(&lows, RANGE_LOW_WINDOW),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_fast.is_empty()
    }
}

/// Exponential moving average seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);

    for (i, &price) in values.iter().enumerate().skip(period) {
        prev = price * k + prev * (1.0 - k);
        out[i] = Some(prev);
    }
    out
}

/// Simple moving average over a complete series.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (offset, window) in values.windows(period).enumerate() {
        out[offset + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

/// Simple moving average over a series with gaps; a window touching an
/// unavailable slot stays unavailable.
pub fn sma_opt(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (offset, window) in values.windows(period).enumerate() {
        let sum: Option<f64> = window.iter().copied().sum();
        out[offset + period - 1] = sum.map(|s| s / period as f64);
    }
    out
}

/// Wilder RSI. First value lands on index `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    // changes[j] is the move into candle j + 1
    for (j, &c) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
        out[j + 1] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Wilder ATR. True range needs a previous close, so the first value lands
/// on index `period`.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() <= period {
        return out;
    }

    let trs: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let pc = w[0].close;
            let c = w[1];
            (c.high - c.low)
                .max((c.high - pc).abs())
                .max((c.low - pc).abs())
        })
        .collect();

    let p = period as f64;
    let mut value = trs[..period].iter().sum::<f64>() / p;
    out[period] = Some(value);

    for (j, &tr) in trs.iter().enumerate().skip(period) {
        value = (value * (p - 1.0) + tr) / p;
        out[j + 1] = Some(value);
    }
    out
}

/// Normalised Bollinger width. `None` when the history is shorter than the
/// band period.
pub fn bollinger_width(closes: &[f64], period: usize, std_dev_factor: f64) -> Option<Vec<Option<f64>>> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let mut out = vec![None; closes.len()];
    for (offset, window) in closes.windows(period).enumerate() {
        let mid = window.iter().mean();
        if mid == 0.0 || !mid.is_finite() {
            continue;
        }
        let sd = window.iter().population_std_dev();
        let upper = mid + std_dev_factor * sd;
        let lower = mid - std_dev_factor * sd;
        out[offset + period - 1] = Some((upper - lower) / mid);
    }
    Some(out)
}

/// Rolling minimum including the current slot.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (offset, w) in values.windows(window).enumerate() {
        out[offset + window - 1] = Some(w.iter().copied().fold(f64::INFINITY, f64::min));
    }
    out
}

// =======================================================================
// UNIT TESTS
// =======================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|v| (v - b).abs() < 1e-9).unwrap_or(false)
    }

    fn flat(n: usize, price: f64) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Candle {
                ts: t0 + Duration::days(i as i64),
                open: price,
                high: price + 1.0,
                low: price - 1.0,
                close: price,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn ema_is_sma_seeded() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 2.0));
        // alpha = 0.5
        assert!(approx(out[3], 3.0));
        assert!(approx(out[4], 4.0));
    }

    #[test]
    fn ema_short_input_is_unavailable() {
        assert!(ema(&[1.0, 2.0], 3).iter().all(Option::is_none));
    }

    #[test]
    fn sma_opt_needs_complete_window() {
        let out = sma_opt(&[None, Some(2.0), Some(4.0), Some(6.0)], 2);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 3.0));
        assert!(approx(out[3], 5.0));
    }

    #[test]
    fn rsi_rising_series_saturates() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[13], None);
        assert!(approx(out[14], 100.0));
        assert!(approx(out[19], 100.0));
    }

    #[test]
    fn rsi_balanced_moves_is_fifty() {
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let out = rsi(&closes, 14);
        assert!(approx(out[14], 50.0));
    }

    #[test]
    fn atr_of_constant_range() {
        let out = atr(&flat(20, 50.0), 14);
        assert_eq!(out[13], None);
        assert!(approx(out[14], 2.0));
        assert!(approx(out[19], 2.0));
    }

    #[test]
    fn bollinger_width_flat_is_zero_and_short_is_none() {
        let closes = vec![10.0; 25];
        let w = bollinger_width(&closes, 20, 2.0).unwrap();
        assert_eq!(w[18], None);
        assert!(approx(w[19], 0.0));
        assert!(bollinger_width(&closes[..10], 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_width_uses_population_sigma() {
        // mean 2, population sigma 1 → width = 4σ / mid = 2
        let w = bollinger_width(&[1.0, 3.0], 2, 2.0).unwrap();
        assert!(approx(w[1], 2.0));
    }

    #[test]
    fn rolling_min_includes_current_slot() {
        let out = rolling_min(&[5.0, 3.0, 4.0, 1.0], 3);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 3.0));
        assert!(approx(out[3], 1.0));
    }

    #[test]
    fn compute_falls_back_to_zero_width_on_short_history() {
        let s = IndicatorSeries::compute(&flat(10, 20.0));
        assert_eq!(s.len(), 10);
        assert!(s.bb_width.iter().all(|v| *v == Some(0.0)));
        assert!(s.bb_width_avg.iter().all(|v| *v == Some(0.0)));
        assert!(s.ema_fast.iter().all(Option::is_none));
    }

    #[test]
    fn compute_is_index_aligned() {
        let candles = flat(250, 20.0);
        let s = IndicatorSeries::compute(&candles);
        for series in [&s.ema_fast, &s.ema_slow, &s.rsi, &s.atr, &s.bb_width, &s.bb_width_avg, &s.volume_avg, &s.range_low] {
            assert_eq!(series.len(), candles.len());
        }
        assert_eq!(s.ema_slow[198], None);
        assert!(approx(s.ema_slow[199], 20.0));
        assert!(approx(s.range_low[29], 19.0));
        assert_eq!(s.bb_width_avg[37], None);
        assert!(approx(s.bb_width_avg[38], 0.0));
    }
}
