//! Market-regime reference series (BTC by default).
//!
//! Populated lazily on first use and then shared read-only by every asset in
//! every scan until `invalidate()` is called. A failed population leaves the
//! cache empty, so the next scan tries again.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::services::market_data::{MarketDataProvider, Resolution};
use crate::services::strategies::indicators::{ema, EMA_FAST};
use crate::services::strategies::Candle;
use crate::utils::errors::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct RegimePoint {
    date: NaiveDate,
    close: f64,
    ema_fast: f64,
}

/// Reference closes and EMA(21), keyed by calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSeries {
    points: Vec<RegimePoint>,
}

impl ReferenceSeries {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let points = candles
            .iter()
            .zip(ema(&closes, EMA_FAST))
            .filter_map(|(c, e)| {
                Some(RegimePoint {
                    date: c.date(),
                    close: c.close,
                    ema_fast: e?,
                })
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Close above EMA(21) on the nearest date at or before `date`.
    /// `None` when the series has nothing that early.
    pub fn is_bullish_on(&self, date: NaiveDate) -> Option<bool> {
        let pos = self.points.partition_point(|p| p.date <= date);
        let point = self.points.get(pos.checked_sub(1)?)?;
        Some(point.close > point.ema_fast)
    }
}

pub struct ReferenceCache {
    asset: String,
    period: String,
    slot: Mutex<Option<Arc<ReferenceSeries>>>,
}

impl ReferenceCache {
    pub fn new(asset: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            period: period.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn is_reference(&self, asset: &str) -> bool {
        self.asset.eq_ignore_ascii_case(asset)
    }

    /// Returns the cached series, fetching it first if the cache is empty.
    /// Callers racing here wait on the same lock, so only one fetch runs.
    pub async fn get_or_populate(
        &self,
        provider: &dyn MarketDataProvider,
    ) -> Result<Arc<ReferenceSeries>, ProviderError> {
        let mut slot = self.slot.lock().await;
        if let Some(series) = slot.as_ref() {
            return Ok(Arc::clone(series));
        }

        let candles = provider
            .fetch_candles(&self.asset, &self.period, Resolution::Daily)
            .await?;
        if candles.is_empty() {
            return Err(ProviderError::Empty(self.asset.clone()));
        }
        let series = Arc::new(ReferenceSeries::from_candles(&candles));
        log::info!("reference cache populated: {} ({} points)", self.asset, series.len());
        *slot = Some(Arc::clone(&series));
        Ok(series)
    }

    /// Fills an empty cache from history already fetched for the reference
    /// asset itself. A populated cache is left untouched.
    pub async fn prime(&self, candles: &[Candle]) {
        let mut slot = self.slot.lock().await;
        if slot.is_none() && !candles.is_empty() {
            *slot = Some(Arc::new(ReferenceSeries::from_candles(candles)));
            log::debug!("reference cache primed from {} daily history", self.asset);
        }
    }

    pub async fn peek(&self) -> Option<Arc<ReferenceSeries>> {
        self.slot.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
        log::info!("reference cache invalidated: {}", self.asset);
    }
}
