// Shared fixtures for integration tests: an in-memory provider and
// synthetic daily histories.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use signal_scanner::services::market_data::{MarketDataProvider, Resolution};
use signal_scanner::services::strategies::Candle;
use signal_scanner::utils::errors::ProviderError;

pub const SPRING_LEN: usize = 240;
pub const CONFLUENCE_LEN: usize = 260;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
pub struct StaticProvider {
    daily: HashMap<String, Vec<Candle>>,
    hourly: HashMap<String, Vec<Candle>>,
    pub daily_calls: AtomicUsize,
    pub hourly_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn with_daily(mut self, asset: &str, candles: Vec<Candle>) -> Self {
        self.daily.insert(asset.to_string(), candles);
        self
    }

    pub fn with_hourly(mut self, asset: &str, candles: Vec<Candle>) -> Self {
        self.hourly.insert(asset.to_string(), candles);
        self
    }

    pub fn hourly_calls(&self) -> usize {
        self.hourly_calls.load(Ordering::SeqCst)
    }

    pub fn daily_calls(&self) -> usize {
        self.daily_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn fetch_candles(
        &self,
        asset: &str,
        _period: &str,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, ProviderError> {
        let source = match resolution {
            Resolution::Daily => {
                self.daily_calls.fetch_add(1, Ordering::SeqCst);
                &self.daily
            }
            Resolution::Hourly => {
                self.hourly_calls.fetch_add(1, Ordering::SeqCst);
                &self.hourly
            }
        };
        source
            .get(asset)
            .cloned()
            .ok_or_else(|| ProviderError::Upstream(format!("{asset}: No data found")))
    }
}

fn candle(i: usize, close: f64, volume: f64) -> Candle {
    Candle {
        ts: t0() + Duration::days(i as i64),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume,
    }
}

/// Steady uptrend; no order blocks since every candle opens at its close.
pub fn rising(n: usize) -> Vec<Candle> {
    (0..n).map(|i| candle(i, 50.0 + i as f64 * 0.25, 1_000.0)).collect()
}

/// 200 trending candles, then a tightening range around 100 whose
/// third-from-last candle wicks to 90 and whose second-from-last reclaims
/// the range on five times the volume.
pub fn spring_history() -> Vec<Candle> {
    let mut out: Vec<Candle> = (0..SPRING_LEN)
        .map(|i| {
            if i < 200 {
                candle(i, 50.0 + i as f64 * 0.25, 1_000.0)
            } else {
                let amp = 3.0 - (i - 200) as f64 * 0.07;
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                candle(i, 100.0 + amp * sign, 1_000.0)
            }
        })
        .collect();
    out[SPRING_LEN - 3].low = 90.0;
    out[SPRING_LEN - 2].volume = 5_000.0;
    out
}

fn confluence_close(i: usize) -> f64 {
    match i {
        0..=209 => 50.0 + 0.25 * i as f64,
        210..=213 => 102.25 - 4.0 * (i - 209) as f64,
        _ => 86.25 + 0.5 * (i - 213) as f64,
    }
}

/// Long advance, a four-day flush to 86.25, a steady recovery carrying a
/// bullish order block at 255, then a wick to 85 at 257 reclaimed on heavy
/// volume into the block. The wick is a lower low than the flush on a far
/// less oversold RSI, so the spring and the order-block divergence both fire.
pub fn confluence_history() -> Vec<Candle> {
    let mut out: Vec<Candle> = (0..CONFLUENCE_LEN - 3)
        .map(|i| candle(i, confluence_close(i), 1_000.0))
        .collect();

    // down candle whose high the next close clears
    let c = out[255].close;
    out[255].open = c + 0.3;
    out[255].high = c + 0.35;

    let base = confluence_close(256);
    out.push(Candle { low: 85.0, ..candle(257, base - 1.0, 1_000.0) });
    out.push(candle(258, base + 0.2, 5_000.0));
    out.push(candle(259, base + 0.3, 1_000.0));
    out
}

/// Flat hourly closes for the day before `day`, then a dip at `day` 00:00
/// and a close back above the hourly EMA(21) at 01:00.
pub fn hourly_cross(day: DateTime<Utc>) -> Vec<Candle> {
    let start = day - Duration::hours(24);
    (0..48i64)
        .map(|i| {
            let close = match i {
                0..=23 => 100.0,
                24 => 99.0,
                25 => 102.0,
                _ => 103.0,
            };
            Candle {
                ts: start + Duration::hours(i),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            }
        })
        .collect()
}
