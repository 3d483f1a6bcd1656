//! Hourly trigger finder: confirms a daily setup with an EMA(21) crossover
//! on the setup's own calendar day.

use chrono::{DateTime, NaiveDate, Utc};

use crate::services::market_data::{MarketDataProvider, Resolution};
use crate::services::strategies::indicators::{ema, EMA_FAST};
use crate::services::strategies::{Candle, Direction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerHit {
    pub entry: f64,
    pub ts: DateTime<Utc>,
}

/// First in-day close crossing the hourly EMA in `direction`.
pub fn find_trigger(hourly: &[Candle], date: NaiveDate, direction: Direction) -> Option<TriggerHit> {
    let closes: Vec<f64> = hourly.iter().map(|c| c.close).collect();
    let ema = ema(&closes, EMA_FAST);

    let day: Vec<(&Candle, f64)> = hourly
        .iter()
        .zip(ema)
        .filter(|(c, _)| c.date() == date)
        .filter_map(|(c, e)| Some((c, e?)))
        .collect();

    day.windows(2).find_map(|w| {
        let ((prev, prev_ema), (cur, cur_ema)) = (w[0], w[1]);
        let crossed = match direction {
            Direction::Bullish => prev.close <= prev_ema && cur.close > cur_ema,
            Direction::Bearish => prev.close >= prev_ema && cur.close < cur_ema,
        };
        crossed.then_some(TriggerHit {
            entry: cur.close,
            ts: cur.ts,
        })
    })
}

/// Fetches the hourly window and searches it. Missing data is a miss, not an
/// error.
pub async fn confirm(
    provider: &dyn MarketDataProvider,
    asset: &str,
    period: &str,
    date: NaiveDate,
    direction: Direction,
) -> Option<TriggerHit> {
    match provider.fetch_candles(asset, period, Resolution::Hourly).await {
        Ok(hourly) => find_trigger(&hourly, date, direction),
        Err(e) => {
            log::debug!("{asset}: hourly data unavailable, no trigger: {e}");
            None
        }
    }
}
